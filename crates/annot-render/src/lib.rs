pub mod error;
pub mod hit;
pub mod pixels;
pub mod raster;
pub mod text;

pub use error::RenderError;
pub use hit::{hit_test, hit_test_rect};
pub use pixels::{DecodedImage, ImageCache};
pub use raster::{content_bounds, fit_multiplier, render_region, render_view};
pub use text::{text_runs, FontBook, TextRun};
