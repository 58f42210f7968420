mod batch_fetch;
mod common;
