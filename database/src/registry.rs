use enum_primitive_derive::Primitive;

/// We use `u8::MAX` which is never a valid store prefix. The [`DatabaseStorePrefixes`]
/// enum makes sure it is not used as a prefix as well
pub const SEPARATOR: u8 = u8::MAX;

#[derive(Primitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseStorePrefixes {
    // ---- Header chain ----
    Headers = 1,
    HeaderNumbers = 2,
    CanonicalHashes = 3,
    TotalDifficulties = 4,
    HeadHash = 5,

    // ---- Retrieved block data ----
    BlockBodies = 16,
    Receipts = 17,
    StateEntries = 18,

    // ---- Indexes ----
    BloomSections = 32,

    // ---- Separator ----
    /// Reserved as a separator
    Separator = SEPARATOR,
}

impl From<DatabaseStorePrefixes> for Vec<u8> {
    fn from(value: DatabaseStorePrefixes) -> Self {
        [value as u8].to_vec()
    }
}

impl From<DatabaseStorePrefixes> for u8 {
    fn from(value: DatabaseStorePrefixes) -> Self {
        value as u8
    }
}

impl AsRef<[u8]> for DatabaseStorePrefixes {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: enum has repr(u8)
        std::slice::from_ref(unsafe { &*(self as *const Self as *const u8) })
    }
}
