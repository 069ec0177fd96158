use lamina_schema::expr::FieldAccess;
use serde::{Serialize, de::DeserializeOwned};

///
/// Recordable
///
/// The contract a record type owes the engine: a stable name matching its
/// schema entity, a deterministic byte round-trip via serde, and field
/// extraction for index evaluation. The primary key is always derived by
/// evaluating the entity's canonical key expression, so `FieldAccess` must
/// cover every primary-key field.
///

pub trait Recordable: Serialize + DeserializeOwned + FieldAccess {
    fn record_name() -> &'static str;
}
