//! Startup tune stub (component 11): out of design scope, kept so the
//! CLI surface matches the original tool's.

use std::path::Path;

use log::info;

/// Would play `<tune_folder>/intro.csv` on a piezo buzzer at startup;
/// here it only logs that the tune was skipped.
pub fn play_intro(tune_folder: Option<&str>) {
    let Some(folder) = tune_folder else {
        return;
    };
    let path = Path::new(folder).join("intro.csv");
    if path.exists() {
        info!("skipping startup tune at {} (buzzer hardware not implemented)", path.display());
    } else {
        info!("no intro.csv found under {folder}, nothing to play");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_folder_is_a_silent_no_op() {
        play_intro(None);
    }

    #[test]
    fn missing_tune_file_logs_without_panicking() {
        play_intro(Some("/nonexistent/tune/folder"));
    }
}
