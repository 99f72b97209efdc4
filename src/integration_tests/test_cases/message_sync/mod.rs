pub mod load_older;
pub mod report_viewport;
pub mod switch_during_fetch;
pub mod verify_stream_update;
pub mod verify_view;

pub use load_older::*;
pub use report_viewport::*;
pub use switch_during_fetch::*;
pub use verify_stream_update::*;
pub use verify_view::*;
