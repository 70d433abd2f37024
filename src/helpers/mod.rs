//! Low-level parsing utilities shared by the XML document and workbook modules.

pub(crate) mod xml;
pub(crate) mod zip;
