//! Terminal rendering of batch progress and results.
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use kindlr_core::batch::{BatchReport, BatchSnapshot};

/// Creates the progress bar for a batch of `total` files.
///
/// It draws on stdout so that log output on stderr does not tear it.
pub fn batch_bar(total: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stdout());
    bar.set_prefix("Converting");
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {pos}/{len} {msg}")?
            .progress_chars("■ "),
    );
    Ok(bar)
}

pub fn update_bar(bar: &ProgressBar, snapshot: &BatchSnapshot<'_>) {
    bar.set_position(snapshot.completed() as u64);
    if !snapshot.failed.is_empty() {
        bar.set_message(format!("{} failed", style(snapshot.failed.len()).red()));
    }
}

pub fn print_report(report: &BatchReport) {
    if report.total == 0 {
        println!("Nothing to convert.");
        return;
    }

    if report.all_succeeded() {
        println!("\n✨ {}", style("Done!").green().bold());
    } else {
        println!("\n{}", style("Failed to convert these files:").bold());
        for file in &report.failed {
            println!("  {} {}", style("✗").red(), style(&file.name).red());
            println!("      {}", style(&file.detail).dim());
        }
    }

    if !report.succeeded.is_empty() {
        println!("\n{}", style("The following files were sent:").bold());
        for name in &report.succeeded {
            println!("  {} {}", style("✓").green(), style(name).green());
        }
    }
}
