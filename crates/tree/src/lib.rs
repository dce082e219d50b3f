pub mod error;
pub mod model;
pub mod namespace;
pub mod node;
pub mod parse;
pub mod serialize;

pub use error::TreeError;
pub use model::{NodeKind, QName, XML_NS, XMLNS_NS};
pub use namespace::{EmptyResolver, NamespaceManager, NamespaceResolver};
pub use node::{XmlNode, XmlNodeBuilder, attr, comment, doc, elem, elem_ns, ns, text};
