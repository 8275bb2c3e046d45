mod hook;
pub use hook::BatchFinisher;

mod queue;
pub use queue::{FileOutcome, IngestionQueue, QueueHandle, SettledHook};

mod watcher;
pub use watcher::{DirectoryWatcher, Listed, list_csv_files};
