use crate::store::RawRow;
use std::convert::Infallible;

/// A one-shot provider of raw rows (a CSV download, a fixture, ...).
///
/// The store awaits the whole result before building anything, so a failing source leaves no
/// partial state behind.
pub trait DataSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch(&mut self) -> Result<Vec<RawRow>, Self::Error>;
}

impl DataSource for Vec<RawRow> {
    type Error = Infallible;

    fn fetch(&mut self) -> Result<Vec<RawRow>, Self::Error> {
        Ok(std::mem::take(self))
    }
}

/// Adapts a closure into a [`DataSource`].
pub struct FnSource<F>(F);

pub fn from_fn<F, E>(fetch: F) -> FnSource<F>
where
    F: FnMut() -> Result<Vec<RawRow>, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    FnSource(fetch)
}

impl<F, E> DataSource for FnSource<F>
where
    F: FnMut() -> Result<Vec<RawRow>, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn fetch(&mut self) -> Result<Vec<RawRow>, E> {
        (self.0)()
    }
}
