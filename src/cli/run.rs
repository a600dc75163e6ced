use crate::cli::RunArgs;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run(args: &RunArgs) -> Result<()> {
    let mut settings = load_settings();
    args.apply(&mut settings);
    super::extract::extract(&settings)?;
    println!();
    super::aggregate::aggregate(&settings)?;
    Ok(())
}
