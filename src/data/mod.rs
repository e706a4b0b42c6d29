/// Training data sources
///
/// The service can be pre-trained from a CSV export of historical flights
/// (`Fecha-I`, `Fecha-O`, `OPERA`, `MES`, `TIPOVUELO` and, optionally, an
/// already computed `delay` column). Extra columns are ignored.
pub mod loader;

pub use loader::TrainingDataLoader;
