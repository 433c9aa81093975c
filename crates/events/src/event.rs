use catalog_core::ProductId;

/// The closed set of product lifecycle events.
///
/// Unknown `event_type` strings never become an `EventKind`; they are
/// rejected by the codec and handled as a permanent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Deleted,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Created, EventKind::Deleted];
    pub const COUNT: usize = Self::ALL.len();

    /// Name used on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Created => "create_product",
            Self::Deleted => "delete_product",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "create_product" => Some(Self::Created),
            "delete_product" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Dense index for table lookups.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Created => 0,
            Self::Deleted => 1,
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A product lifecycle fact: "product X was created/deleted".
///
/// Built once at publish time, serialized once, and rebuilt from bytes by the
/// consumer. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifecycleEvent {
    kind: EventKind,
    product_id: ProductId,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, product_id: ProductId) -> Self {
        Self { kind, product_id }
    }

    pub fn created(product_id: ProductId) -> Self {
        Self::new(EventKind::Created, product_id)
    }

    pub fn deleted(product_id: ProductId) -> Self {
        Self::new(EventKind::Deleted, product_id)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }
}
