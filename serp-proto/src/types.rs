macro_rules! wire_newtype {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub $inner);

        impl From<$inner> for $name {
            fn from(val: $inner) -> Self {
                $name(val)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

wire_newtype!(
    ClientId,
    u16,
    "Identifies one endpoint on the relay. `0` addresses the server itself, \
     `0xFFFF` marks a multicast destination and is never assigned."
);

impl ClientId {
    pub const SERVER: ClientId = ClientId(0);
    pub const MULTICAST: ClientId = ClientId(0xFFFF);

    /// True for ids the server may hand out to clients.
    pub fn is_assignable(self) -> bool {
        self != Self::SERVER && self != Self::MULTICAST
    }

    pub fn is_server(self) -> bool {
        self == Self::SERVER
    }

    pub fn is_multicast(self) -> bool {
        self == Self::MULTICAST
    }
}

wire_newtype!(
    MessageId,
    u32,
    "Identifier of a logical message, chosen by the sender. Only required \
     unique per sender within a reassembly-window lifetime."
);

impl MessageId {
    pub fn wrapping_add(self, val: u32) -> Self {
        MessageId(self.0.wrapping_add(val))
    }
}
