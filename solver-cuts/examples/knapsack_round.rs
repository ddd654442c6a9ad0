//! One cut round on a small mixed instance.
//!
//! Prints the cuts each round returns together with the manager statistics.

use solver_cuts::{
    CircuitArc, Constraint, CutManager, CutResult, CutSettings, LinearConstraint, NoTimeLimit,
    SnapshotBuilder,
};

fn main() -> CutResult<()> {
    let mut builder = SnapshotBuilder::new(0);

    // 3x1 + 5x2 + 4x3 + 6x4 <= 10 at (1, 0.8, 1, 0.5)
    let x1 = builder.add_binary(1.0);
    let x2 = builder.add_binary(0.8);
    let x3 = builder.add_binary(1.0);
    let x4 = builder.add_binary(0.5);

    // Two subtours 0 -> 1 -> 0 and 2 -> 3 -> 2
    let mut arcs = Vec::new();
    for (tail, head) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
        arcs.push(CircuitArc {
            tail,
            head,
            literal: builder.add_binary(1.0),
        });
    }
    for (tail, head) in [(1, 2), (3, 0)] {
        arcs.push(CircuitArc {
            tail,
            head,
            literal: builder.add_binary(0.0),
        });
    }

    // y = x^2 with x in [0, 4]
    let x = builder.add_integer(1.5, 0, 4);
    let y = builder.add_integer(1.0, 0, 16);

    let snapshot = builder.build();
    let constraints = vec![
        LinearConstraint::less_or_equal([(3, x1), (5, x2), (4, x3), (6, x4)], 10)?.into(),
        Constraint::Circuit { num_nodes: 4, arcs },
        Constraint::Square { square: y, base: x },
    ];

    let mut manager = CutManager::new(CutSettings::default())?;
    let cuts = manager.run_round(&snapshot, &constraints, &NoTimeLimit)?;

    println!("\n{:=<72}", "");
    println!("CUT ROUND {}", snapshot.round());
    println!("{:=<72}\n", "");
    println!("{:<14} {:>10} {:>10}  Cut", "Source", "Violation", "Efficacy");
    println!("{:-<72}", "");
    for cut in &cuts {
        println!(
            "{:<14} {:>10.4} {:>10.4}  {}",
            cut.source.kind().name(),
            cut.violation,
            cut.efficacy(),
            cut.constraint
        );
    }
    println!("{:-<72}", "");

    let stats = manager.stats();
    println!(
        "{} candidates, {} dropped, {} duplicates, {} returned",
        stats.candidates, stats.dropped, stats.duplicates, stats.cuts_returned
    );
    Ok(())
}
