use anyhow::Result;

fn main() -> Result<()> {
    curate_cli::main_entry()
}
