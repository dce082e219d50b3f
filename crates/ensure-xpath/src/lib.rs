//! Make a simplified XPath exist in an XML tree.
//!
//! Paths are relative child-element steps with optional attribute predicates
//! and an optional trailing attribute step:
//!
//! ```text
//! configuration/appSettings/add[@key='name' and @attr]/ns:name
//! Element/Genre[@href='start']/@lang
//! ```
//!
//! Missing steps are created, existing ones reused. A created element carries
//! the attributes its predicates ask for, so evaluating the same path again
//! finds it.
//!
//! ```
//! use ensure_xpath::{ensure_xpath, get_or_create_element};
//! use ensure_xpath_tree::{NamespaceManager, XmlNode};
//!
//! let tva = NamespaceManager::new().with("tva", "urn:tva:metadata:2010");
//! let root = XmlNode::parse_str("<Root xmlns='urn:tva:metadata:2010'/>").unwrap();
//! let path = "tva:Element/tva:Genre[@href='startTime' and @type='other']/tva:Definition";
//!
//! let edited = ensure_xpath(&root, path, Some(&tva)).unwrap();
//! assert_ne!(edited, root);
//! assert_eq!(
//!     edited.to_xml_string().unwrap(),
//!     concat!(
//!         r#"<Root xmlns="urn:tva:metadata:2010"><Element>"#,
//!         r#"<Genre href="startTime" type="other"><Definition/></Genre>"#,
//!         "</Element></Root>",
//!     )
//! );
//! assert_eq!(ensure_xpath(&edited, path, Some(&tva)).unwrap(), edited);
//!
//! let definition = get_or_create_element(&edited, path, Some(&tva)).unwrap();
//! assert_eq!(definition.local_name(), Some("Definition"));
//! ```

pub mod error;
pub mod helpers;
pub mod options;
pub mod parser;
pub mod placement;
pub mod query;
pub mod resolver;

pub use error::Error;
pub use options::{EnsureOptions, Ensurer, PathLimits};
pub use parser::{AttributePredicate, PathExpression, Step, parse_path, parse_path_with};
pub use placement::insert_after;
pub use resolver::{
    CreateMode, Placement, create_element, create_node, ensure_xpath, get_or_create_element,
    get_or_create_element_after, get_or_create_node, resolve,
};
