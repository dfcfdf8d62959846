mod sync_test;
