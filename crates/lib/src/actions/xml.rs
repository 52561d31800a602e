//! Minimal XML document tree returned by [`BuildActions::load_xml`](super::BuildActions::load_xml).
//!
//! Only what project inspection needs is kept: element local names (namespaces
//! are dropped), attributes, child elements and trimmed text content.

use std::collections::BTreeMap;

/// An element of a loaded XML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
  /// Local name, without namespace prefix.
  pub name: String,
  pub attributes: BTreeMap<String, String>,
  pub children: Vec<XmlElement>,
  /// Concatenated text of direct text children, trimmed.
  pub text: String,
}

impl XmlElement {
  /// Parse a document and return its root element.
  pub fn parse(source: &str) -> Result<Self, roxmltree::Error> {
    let document = roxmltree::Document::parse(source)?;
    Ok(convert(document.root_element()))
  }

  pub fn attribute(&self, name: &str) -> Option<&str> {
    self.attributes.get(name).map(String::as_str)
  }

  /// Direct children with the given local name.
  pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
    self.children.iter().filter(move |child| child.name == name)
  }

  /// All elements below this one in document order, excluding `self`.
  pub fn descendants(&self) -> Vec<&XmlElement> {
    let mut found = Vec::new();
    let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
    while let Some(element) = stack.pop() {
      found.push(element);
      stack.extend(element.children.iter().rev());
    }
    found
  }
}

fn convert(node: roxmltree::Node<'_, '_>) -> XmlElement {
  let mut element = XmlElement {
    name: node.tag_name().name().to_string(),
    attributes: node
      .attributes()
      .map(|attr| (attr.name().to_string(), attr.value().to_string()))
      .collect(),
    ..Default::default()
  };

  for child in node.children() {
    if child.is_element() {
      element.children.push(convert(child));
    } else if child.is_text()
      && let Some(text) = child.text()
    {
      element.text.push_str(text);
    }
  }
  element.text = element.text.trim().to_string();
  element
}
