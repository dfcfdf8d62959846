mod progress_test;
mod state_store_test;
mod sync_test;
