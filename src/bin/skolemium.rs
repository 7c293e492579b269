use clap::Parser;
use miette::Result;
use skolemium::{
    cli::Cli,
    engine::Solver,
    qdimacs::{ExtendedParseError, QdimacsParser},
    SolverResult,
};
use std::io::{Cursor, Write};

fn main() -> Result<SolverResult> {
    let cli = Cli::parse();
    cli.init_logging();

    let contents = cli.read_input()?;
    let reader = Cursor::new(&contents);

    let mut solver: Solver = match QdimacsParser::new(reader).parse() {
        Ok(solver) => solver,
        Err(err) => Err(ExtendedParseError { source_code: contents, related: vec![err] })?,
    };
    solver.set_options(cli.solver_options());

    let result = solver.solve();
    match result {
        SolverResult::Satisfiable => {
            if cli.qdimacs_out {
                println!("s cnf 1");
            } else {
                println!("SAT");
            }
        }
        SolverResult::Unsatisfiable => {
            if cli.qdimacs_out {
                println!("s cnf 0");
            } else {
                println!("UNSAT");
            }
            if let Some(assignment) = solver.refuting_assignment() {
                let lits: Vec<String> =
                    assignment.iter().map(|lit| lit.to_dimacs().to_string()).collect();
                println!("V {}", lits.join(" "));
            }
        }
        SolverResult::Unknown => println!("UNKNOWN"),
    }

    if let Some(path) = &cli.certificate {
        match result {
            SolverResult::Satisfiable => {
                let aig = solver.build_certificate().map_err(miette::Report::new)?;
                solver.verify_certificate(&aig).map_err(miette::Report::new)?;
                if path.as_os_str() == "stdout" {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    aig.write_ascii(&mut lock).map_err(to_io_report)?;
                    lock.flush().map_err(to_io_report)?;
                } else {
                    let mut file = std::fs::File::create(path).map_err(to_io_report)?;
                    if path.extension().is_some_and(|ext| ext == "aig") && !cli.qbfcert {
                        aig.write_binary(&mut file).map_err(to_io_report)?;
                    } else {
                        aig.write_ascii(&mut file).map_err(to_io_report)?;
                    }
                }
            }
            SolverResult::Unsatisfiable => {
                solver.verify_refutation().map_err(miette::Report::new)?;
            }
            SolverResult::Unknown => {}
        }
    }

    Ok(result)
}

fn to_io_report(err: std::io::Error) -> miette::Report {
    miette::Report::msg(format!("cannot write certificate: {err}"))
}
