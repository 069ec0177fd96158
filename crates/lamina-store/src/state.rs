use lamina_core::{
    error::Error,
    kv::Transaction,
    subspace::Subspace,
    tuple::{Element, Tuple},
};

///
/// IndexState
///
/// Lifecycle of one index within one store. Write-only indexes are
/// maintained on every record change but not yet trusted for reads;
/// disabled indexes are skipped entirely.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IndexState {
    Disabled,
    WriteOnly,
    #[default]
    Readable,
}

impl IndexState {
    const fn code(self) -> i64 {
        match self {
            Self::Disabled => 0,
            Self::WriteOnly => 1,
            Self::Readable => 2,
        }
    }

    const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Disabled),
            1 => Some(Self::WriteOnly),
            2 => Some(Self::Readable),
            _ => None,
        }
    }

    #[must_use]
    pub const fn maintains_entries(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Key for one index's state under the store-info subspace.
#[must_use]
pub fn state_key(store_info: &Subspace, index_name: &str) -> Vec<u8> {
    store_info
        .subspace("indexState")
        .pack(&Tuple::single(index_name))
}

/// Read an index state; an absent key means the index is readable (new
/// stores are born with every schema index built).
pub fn read_state(
    tx: &dyn Transaction,
    store_info: &Subspace,
    index_name: &str,
) -> Result<IndexState, Error> {
    let Some(raw) = tx.get(&state_key(store_info, index_name), false)? else {
        return Ok(IndexState::Readable);
    };

    let tuple = Tuple::unpack(&raw)?;
    match tuple.get(0) {
        Some(Element::Int(code)) => IndexState::from_code(*code)
            .ok_or_else(|| Error::internal(format!("unknown index state code {code}"))),
        _ => Err(Error::internal("corrupt index state entry")),
    }
}

/// Persist an index state.
pub fn write_state(
    tx: &mut dyn Transaction,
    store_info: &Subspace,
    index_name: &str,
    state: IndexState,
) {
    tx.set(
        &state_key(store_info, index_name),
        &Tuple::single(state.code()).pack(),
    );
}
