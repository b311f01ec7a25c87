pub mod dispatcher;
pub mod refresher;

pub use dispatcher::{run_dispatcher, AlertSink, QueueSink};
pub use refresher::run_refresher;
