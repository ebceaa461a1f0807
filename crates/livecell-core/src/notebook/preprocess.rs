//! Source preprocessors applied right before a cell is sent to the kernel.

use std::sync::Arc;

/// Pure transform of a cell's source.
pub type Preprocessor = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Remove IPython magics and shell escapes.
///
/// A leading cell magic (`%%name`) drops the whole cell. Line magics (`%name`)
/// and shell escapes (`!cmd`) are blanked so line numbers in tracebacks still
/// match the source the user sees. Line endings, including `\r\n` and a
/// trailing newline, are kept as they are.
pub fn strip_magics(source: &str) -> String {
    let first = source.lines().find(|l| !l.trim().is_empty());
    if first.is_some_and(|l| l.trim_start().starts_with("%%")) {
        return String::new();
    }

    source
        .split_inclusive('\n')
        .map(|line| {
            let body = line.trim_end_matches(['\r', '\n']);
            let trimmed = body.trim_start();
            if trimmed.starts_with('%') || trimmed.starts_with('!') {
                &line[body.len()..]
            } else {
                line
            }
        })
        .collect()
}

/// [`strip_magics`] as a [`Preprocessor`].
pub fn magic_stripper() -> Preprocessor {
    Arc::new(strip_magics)
}
