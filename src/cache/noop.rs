use crate::cache::Cache;
use crate::error::Result;

/// Never stores anything; every lookup is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
