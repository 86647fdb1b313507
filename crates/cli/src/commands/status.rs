//! Working-tree status display.

use anyhow::Result;

use super::{style, CliContext};

pub fn run_status(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let status = ctx.manager.status_repository(id)?;

    println!();
    println!("{}", style::header(&format!("{} ({})", repo.name, repo.local_path.display())));
    println!();

    if !status.has_changes {
        println!("  {}", style::dim("working tree clean"));
        return Ok(());
    }

    for path in &status.modified {
        println!("  {} {}", style::warn("M"), path);
    }
    for path in &status.added {
        println!("  {} {}", style::success("A"), path);
    }
    for path in &status.removed {
        println!("  {} {}", style::error("D"), path);
    }
    for path in &status.untracked {
        println!("  {} {}", style::dim("?"), path);
    }
    println!();
    Ok(())
}
