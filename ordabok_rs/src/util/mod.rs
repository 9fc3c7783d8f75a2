pub(crate) mod cache;
pub(crate) mod latin1;
