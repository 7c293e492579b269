use clap::Parser;
use miette::Result;
use skolemium::{
    cli::Cli,
    qcnf::QCNF,
    qdimacs::{ExtendedParseError, QdimacsParser},
};
use std::io::Cursor;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    let contents = cli.read_input()?;
    let reader = Cursor::new(&contents);

    let qcnf: QCNF = match QdimacsParser::new(reader).parse() {
        Ok(q) => q,
        Err(err) => Err(ExtendedParseError { source_code: contents, related: vec![err] })?,
    };

    print!("{qcnf}");
    Ok(())
}
