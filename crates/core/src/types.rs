//! Identifikationstypen fuer Postillon
//!
//! Client-IDs werden vom Server beim JOIN vergeben und stehen als `i32` in
//! den `from_id`/`to_id`-Feldern jedes Records. Das Newtype verhindert
//! Verwechslungen mit Ports oder Laengenfeldern.

use serde::{Deserialize, Serialize};

/// Vom Server vergebene Client-ID
///
/// IDs beginnen bei 1 und werden waehrend einer Server-Laufzeit nie
/// wiederverwendet. `0` steht im Protokoll fuer den Server selbst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i32);

impl ClientId {
    /// Absender-ID fuer Records, die der Server selbst erzeugt
    pub const SERVER: ClientId = ClientId(0);

    /// Erste ID, die der Server vergibt
    pub const ERSTE: ClientId = ClientId(1);

    /// Gibt den Wire-Wert zurueck
    pub fn inner(&self) -> i32 {
        self.0
    }

    /// Gibt die naechste ID in der Vergabereihenfolge zurueck
    pub fn naechste(&self) -> ClientId {
        ClientId(self.0 + 1)
    }

    /// `true` fuer die Server-ID
    pub fn ist_server(&self) -> bool {
        *self == Self::SERVER
    }
}

impl From<i32> for ClientId {
    fn from(wert: i32) -> Self {
        Self(wert)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}
