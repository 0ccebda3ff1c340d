//! Presentation settings handed to whatever draws the results.
//!
//! Nothing here is read from disk; callers construct or deserialize a
//! [`PlotStyle`] and pass it along with the data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    /// Optional named theme the renderer may resolve on its side.
    pub theme: Option<String>,
    pub prey_color: String,
    pub predator_color: String,
    pub arrow_color: String,
    pub line_width: f64,
    /// Figure size in inches, `(width, height)`.
    pub figure_size: (f64, f64),
    /// Draw field arrows at unit length instead of true magnitude.
    pub normalize_arrows: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            theme: None,
            prey_color: "#1f77b4".to_string(),
            predator_color: "#d62728".to_string(),
            arrow_color: "#7f7f7f".to_string(),
            line_width: 1.5,
            figure_size: (10.0, 4.0),
            normalize_arrows: true,
        }
    }
}
