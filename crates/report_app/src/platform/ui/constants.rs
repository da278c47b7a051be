/// Width of the textual progress bar, in characters.
pub const PROGRESS_BAR_WIDTH: usize = 30;
/// Longest cell printed in a preview table before it is cut.
pub const MAX_CELL_WIDTH: usize = 40;
/// Rows printed per preview section.
pub const MAX_PREVIEW_ROWS: usize = 20;
