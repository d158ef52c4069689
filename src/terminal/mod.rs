//! Terminal output: colored status lines, the progress bar and the run
//! summary.

pub mod colors;
pub mod progress;
pub mod size;

pub use colors::{
    Color, Styled, Symbols, print_error, print_info, print_success, print_warning,
    stderr_supports_color, stdout_supports_color,
};
pub use progress::{ProgressBar, ProgressConfig, print_summary};
pub use size::{format_size, parse_size};
