use crate::constants::APPLICATION_KIND_BASE;

/// The message family carried in the SMP `kind` field.
///
/// Values `0..=3` are protocol control traffic; everything from
/// [`APPLICATION_KIND_BASE`] up belongs to the application. The gap in
/// between is unassigned and rejected at the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Pings and alive-checks.
    Echo,
    /// Error reports, see [`ErrorOption`].
    Error,
    /// Client admission and disconnection, see [`AdvertisementOption`].
    Advertisement,
    /// Per-fragment acknowledgement of a safe send. The acked fragment is
    /// identified by the SERP header's `id` and `part`.
    MessageReceived,
    /// Opaque application traffic.
    Application(u16),
}

impl MessageKind {
    pub fn raw(self) -> u16 {
        match self {
            MessageKind::Echo => 0,
            MessageKind::Error => 1,
            MessageKind::Advertisement => 2,
            MessageKind::MessageReceived => 3,
            MessageKind::Application(v) => v,
        }
    }

    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(MessageKind::Echo),
            1 => Some(MessageKind::Error),
            2 => Some(MessageKind::Advertisement),
            3 => Some(MessageKind::MessageReceived),
            v if v >= APPLICATION_KIND_BASE => Some(MessageKind::Application(v)),
            _ => None,
        }
    }
}

impl From<MessageKind> for u16 {
    fn from(kind: MessageKind) -> u16 {
        kind.raw()
    }
}

macro_rules! option_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u16)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            pub fn raw(self) -> u16 {
                self as u16
            }

            pub fn from_raw(raw: u16) -> Option<Self> {
                match raw {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

option_enum! {
    /// Options of [`MessageKind::Echo`].
    EchoOption {
        /// Requests an echo reply; the payload is opaque and echoed back.
        Request = 0,
        Reply = 1,
    }
}

option_enum! {
    /// Options of [`MessageKind::Error`].
    ErrorOption {
        /// Catch-all, optionally with a UTF-8 description.
        Unspecified = 0,
        Timeout = 1,
        /// The addressed client is not registered. Carries the missing id
        /// as a big-endian `u16` payload.
        NotFound = 2,
        BadType = 3,
        BadOption = 4,
        /// Admission refused, the client table is full.
        TooManyClients = 5,
    }
}

option_enum! {
    /// Options of [`MessageKind::Advertisement`].
    AdvertisementOption {
        /// Client asks the server for an identity.
        Request = 0,
        /// Server grants an identity, carried as a big-endian `u16` payload.
        Ok = 1,
        /// Either side ends the registration. No reply.
        Disconnect = 2,
    }
}
