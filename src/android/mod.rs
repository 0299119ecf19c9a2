pub mod binary_xml;
pub mod xml;
pub mod zip;
