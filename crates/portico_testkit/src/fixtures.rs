//! The address-book schema and sample data the scenario tests run on.
//!
//! One small hierarchy plus a referencing type:
//!
//! - `AddressBase` (root, owns the table): `nickname`, plus a
//!   relation-kinded `comms` declaration that queries never touch
//! - `PersonalAddress` and `OrganisationalAddress`: the two concrete
//!   levels, bound together by the [`Address`] enum
//! - `Communication`: a flat type holding an enum attribute and a
//!   reference to its owning address

use std::sync::Arc;

use portico_core::{Dao, Db};
use portico_model::{
    Accessor, AttrDef, AttrKind, EntityDef, Key, ModelError, ModelResult, Persistent, Record,
    Timestamp, Value,
};
use portico_store::{MemoryEngine, StoreConfig};

/// Root level of the address hierarchy.
pub static ADDRESS_BASE: EntityDef = EntityDef {
    name: "AddressBase",
    parent: None,
    key_attr: Some("id"),
    declared: &[
        AttrDef::new("nickname", AttrKind::Text),
        AttrDef::new("comms", AttrKind::Relation),
    ],
};

/// Personal addresses: people (and the odd dog).
pub static PERSONAL_ADDRESS: EntityDef = EntityDef {
    name: "PersonalAddress",
    parent: Some(&ADDRESS_BASE),
    key_attr: None,
    declared: &[
        AttrDef::new("first_name", AttrKind::Text),
        AttrDef::new("last_name", AttrKind::Text),
        AttrDef::new("born_at", AttrKind::Timestamp),
    ],
};

/// Organisational addresses: companies and clubs.
pub static ORGANISATIONAL_ADDRESS: EntityDef = EntityDef {
    name: "OrganisationalAddress",
    parent: Some(&ADDRESS_BASE),
    key_attr: None,
    declared: &[AttrDef::new("name", AttrKind::Text)],
};

/// A way to reach an address: phone number, mail address, handle.
pub static COMMUNICATION: EntityDef = EntityDef {
    name: "Communication",
    parent: None,
    key_attr: Some("id"),
    declared: &[
        AttrDef::new("comm_type", AttrKind::Enum),
        AttrDef::new("locator", AttrKind::Text),
        AttrDef::new("note", AttrKind::Text),
        AttrDef::new("owner", AttrKind::Reference),
    ],
};

/// The kind of channel a [`Communication`] describes. Stored by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommType {
    /// Landline number.
    Phone,
    /// Mobile number.
    Mobile,
    /// Mail address.
    Email,
    /// Messenger handle.
    Messenger,
}

impl CommType {
    /// The stored discriminant.
    #[must_use]
    pub const fn ordinal(self) -> i64 {
        self as i64
    }

    /// Resolves a stored discriminant.
    #[must_use]
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(CommType::Phone),
            1 => Some(CommType::Mobile),
            2 => Some(CommType::Email),
            3 => Some(CommType::Messenger),
            _ => None,
        }
    }
}

impl From<CommType> for Value {
    fn from(ct: CommType) -> Self {
        Value::Int(ct.ordinal())
    }
}

/// A person's address entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalAddress {
    /// Identity, `None` until saved.
    pub key: Option<Key>,
    /// Short name the entry is found under.
    pub nickname: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Birthday, where known.
    pub born_at: Option<Timestamp>,
}

impl Persistent for PersonalAddress {
    fn def() -> &'static EntityDef {
        &PERSONAL_ADDRESS
    }

    fn accessors() -> &'static [Accessor<Self>] {
        static ACCESSORS: [Accessor<PersonalAddress>; 4] = [
            Accessor::new("nickname", |a: &PersonalAddress| {
                Value::from(a.nickname.as_str())
            }),
            Accessor::new("first_name", |a: &PersonalAddress| {
                Value::from(a.first_name.as_str())
            }),
            Accessor::new("last_name", |a: &PersonalAddress| {
                Value::from(a.last_name.as_str())
            }),
            Accessor::new("born_at", |a: &PersonalAddress| Value::from(a.born_at)),
        ];
        &ACCESSORS
    }

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn from_record(record: &Record) -> ModelResult<Self> {
        Ok(PersonalAddress {
            key: Some(record.require_key()?),
            nickname: record.text("nickname")?,
            first_name: record.text("first_name")?,
            last_name: record.text("last_name")?,
            born_at: record.opt_timestamp("born_at")?,
        })
    }
}

/// An organisation's address entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganisationalAddress {
    /// Identity, `None` until saved.
    pub key: Option<Key>,
    /// Short name the entry is found under.
    pub nickname: String,
    /// Legal or trading name.
    pub name: String,
}

impl Persistent for OrganisationalAddress {
    fn def() -> &'static EntityDef {
        &ORGANISATIONAL_ADDRESS
    }

    fn accessors() -> &'static [Accessor<Self>] {
        static ACCESSORS: [Accessor<OrganisationalAddress>; 2] = [
            Accessor::new("nickname", |a: &OrganisationalAddress| {
                Value::from(a.nickname.as_str())
            }),
            Accessor::new("name", |a: &OrganisationalAddress| {
                Value::from(a.name.as_str())
            }),
        ];
        &ACCESSORS
    }

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn from_record(record: &Record) -> ModelResult<Self> {
        Ok(OrganisationalAddress {
            key: Some(record.require_key()?),
            nickname: record.text("nickname")?,
            name: record.text("name")?,
        })
    }
}

/// The base-bound view over both concrete address types.
///
/// A `Dao<Address>` works the whole hierarchy: `fetch_all` returns every
/// concrete variant, `save` keeps each row's concrete tag, and hydration
/// dispatches on the stored tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    /// A [`PersonalAddress`] row.
    Personal(PersonalAddress),
    /// An [`OrganisationalAddress`] row.
    Organisational(OrganisationalAddress),
}

impl Address {
    /// The shared nickname attribute.
    #[must_use]
    pub fn nickname(&self) -> &str {
        match self {
            Address::Personal(a) => &a.nickname,
            Address::Organisational(a) => &a.nickname,
        }
    }
}

impl Persistent for Address {
    fn def() -> &'static EntityDef {
        &ADDRESS_BASE
    }

    fn accessors() -> &'static [Accessor<Self>] {
        static ACCESSORS: [Accessor<Address>; 1] =
            [Accessor::new("nickname", |a: &Address| Value::from(a.nickname()))];
        &ACCESSORS
    }

    fn key(&self) -> Option<Key> {
        match self {
            Address::Personal(a) => a.key,
            Address::Organisational(a) => a.key,
        }
    }

    fn assign_key(&mut self, key: Key) {
        match self {
            Address::Personal(a) => a.assign_key(key),
            Address::Organisational(a) => a.assign_key(key),
        }
    }

    fn from_record(record: &Record) -> ModelResult<Self> {
        match record.entity() {
            "PersonalAddress" => Ok(Address::Personal(PersonalAddress::from_record(record)?)),
            "OrganisationalAddress" => Ok(Address::Organisational(
                OrganisationalAddress::from_record(record)?,
            )),
            other => Err(ModelError::unknown_variant("AddressBase", "tag", other)),
        }
    }

    // keep the concrete tag on the record
    fn to_record(&self) -> Record {
        match self {
            Address::Personal(a) => a.to_record(),
            Address::Organisational(a) => a.to_record(),
        }
    }
}

/// A communication channel owned by an address.
#[derive(Debug, Clone, PartialEq)]
pub struct Communication {
    /// Identity, `None` until saved.
    pub key: Option<Key>,
    /// Channel kind.
    pub comm_type: CommType,
    /// Number, address, or handle on that channel.
    pub locator: String,
    /// Free-form note.
    pub note: String,
    /// The owning address row.
    pub owner: Option<Key>,
}

impl Persistent for Communication {
    fn def() -> &'static EntityDef {
        &COMMUNICATION
    }

    fn accessors() -> &'static [Accessor<Self>] {
        static ACCESSORS: [Accessor<Communication>; 4] = [
            Accessor::new("comm_type", |c: &Communication| Value::from(c.comm_type)),
            Accessor::new("locator", |c: &Communication| {
                Value::from(c.locator.as_str())
            }),
            Accessor::new("note", |c: &Communication| Value::from(c.note.as_str())),
            Accessor::new("owner", |c: &Communication| Value::from(c.owner)),
        ];
        &ACCESSORS
    }

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn from_record(record: &Record) -> ModelResult<Self> {
        let ordinal = record.int("comm_type")?;
        let comm_type = CommType::from_ordinal(ordinal).ok_or_else(|| {
            ModelError::unknown_variant("Communication", "comm_type", ordinal.to_string())
        })?;
        Ok(Communication {
            key: Some(record.require_key()?),
            comm_type,
            locator: record.text("locator")?,
            note: record.text("note")?,
            owner: record.opt_reference("owner")?,
        })
    }
}

/// An engine with the address-book schema plus a handle over it.
pub struct TestStore {
    /// The engine, kept around for cursor and row-count assertions.
    pub engine: MemoryEngine,
    /// A handle over `engine`.
    pub db: Db,
}

impl TestStore {
    /// Builds the schema with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::new())
    }

    /// Builds the schema with the given configuration.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        let engine = MemoryEngine::builder()
            .register(&PERSONAL_ADDRESS)
            .register(&ORGANISATIONAL_ADDRESS)
            .register(&COMMUNICATION)
            .config(config)
            .build()
            .expect("address-book schema registers");
        let db = Db::new(Arc::new(engine.clone()));
        TestStore { engine, db }
    }

    /// A dao over the primary handle.
    #[must_use]
    pub fn dao<E: Persistent>(&self) -> Dao<E> {
        Dao::new(&self.db)
    }

    /// An independent handle over the same engine, with its own session.
    #[must_use]
    pub fn second_handle(&self) -> Db {
        Db::new(Arc::new(self.engine.clone()))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A personal entry with no key yet.
#[must_use]
pub fn personal(
    nickname: &str,
    first_name: &str,
    last_name: &str,
    born_at: Option<Timestamp>,
) -> PersonalAddress {
    PersonalAddress {
        key: None,
        nickname: nickname.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        born_at,
    }
}

/// An organisational entry with no key yet.
#[must_use]
pub fn organisational(nickname: &str, name: &str) -> OrganisationalAddress {
    OrganisationalAddress {
        key: None,
        nickname: nickname.to_string(),
        name: name.to_string(),
    }
}

/// The six sample entries: five personal, one organisational.
#[must_use]
pub fn sample_addresses() -> Vec<Address> {
    vec![
        Address::Personal(personal(
            "Nikki",
            "Nico",
            "Lausi",
            Some(Timestamp::from_millis(-23_196_564_000_000)),
        )),
        Address::Personal(personal(
            "Doggi",
            "Oggi",
            "Dalmatian",
            Some(Timestamp::from_millis(1_225_929_600_000)),
        )),
        Address::Personal(personal(
            "Pipa",
            "Pille",
            "Palle",
            Some(Timestamp::from_millis(946_684_800_000)),
        )),
        Address::Personal(personal(
            "Lups",
            "Luna",
            "Pudel",
            Some(Timestamp::from_millis(1_541_462_400_000)),
        )),
        Address::Personal(personal(
            "Lemmi",
            "Ein",
            "Lemming",
            Some(Timestamp::from_millis(1_714_521_600_000)),
        )),
        Address::Organisational(organisational("Die Firma", "TBQ")),
    ]
}

/// Two channels for one owner: a mobile number and a messenger handle.
#[must_use]
pub fn sample_communications(owner: Key) -> Vec<Communication> {
    vec![
        Communication {
            key: None,
            comm_type: CommType::Mobile,
            locator: "0167 345 6789".to_string(),
            note: "Nikki mobile".to_string(),
            owner: Some(owner),
        },
        Communication {
            key: None,
            comm_type: CommType::Messenger,
            locator: "telegram://Nico_Lausi_1234".to_string(),
            note: "Nikki messenger".to_string(),
            owner: Some(owner),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comm_type_ordinals_round_trip() {
        for ct in [
            CommType::Phone,
            CommType::Mobile,
            CommType::Email,
            CommType::Messenger,
        ] {
            assert_eq!(CommType::from_ordinal(ct.ordinal()), Some(ct));
        }
        assert_eq!(CommType::from_ordinal(9), None);
    }

    #[test]
    fn address_records_keep_their_concrete_tag() {
        let personal = Address::Personal(personal("Nikki", "Nico", "Lausi", None));
        assert_eq!(personal.to_record().entity(), "PersonalAddress");

        let organisational = Address::Organisational(organisational("Die Firma", "TBQ"));
        assert_eq!(organisational.to_record().entity(), "OrganisationalAddress");
    }

    #[test]
    fn address_hydration_rejects_foreign_tags() {
        let mut record = Record::new("Communication").with_key(Key::new(1));
        record.set("nickname", "x");
        assert!(Address::from_record(&record).is_err());
    }

    #[test]
    fn sample_data_has_the_documented_shape() {
        let addresses = sample_addresses();
        assert_eq!(addresses.len(), 6);
        let personal = addresses
            .iter()
            .filter(|a| matches!(a, Address::Personal(_)))
            .count();
        assert_eq!(personal, 5);
    }
}
