use snapdisk::{StatvfsProbe, select_tmp_dir};

pub fn execute(global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.options()?;
    let dir = select_tmp_dir(
        options.tmp_dir.as_deref(),
        &options.tmp_candidates,
        &StatvfsProbe,
    )?;
    println!("{}", dir.display());
    Ok(())
}
