//! Node descriptors.
//!
//! An [`Element`] is an immutable value describing one desired tree position.
//! Descriptors are produced fresh by every render call and are discarded once
//! the child reconciler has consumed them.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RenderError;
use crate::hooks::Hooks;

/// Stable identity of a child among its siblings.
pub type Key = Rc<str>;

/// Ordered attribute map carried by host elements and component props.
pub type Attributes = IndexMap<Rc<str>, AttrValue>;

pub type RenderResult = Result<Child, RenderError>;

/// Plain function component signature.
pub type RenderFn = fn(&Props, &mut Hooks<'_>) -> RenderResult;

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(value) => f.write_str(value),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Float(value) => write!(f, "{value}"),
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.into())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value.into())
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value.into())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Attributes plus the children slot.
#[derive(Clone, Debug, Default)]
pub struct Props {
    pub attrs: Attributes,
    pub children: Child,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, name: impl Into<Rc<str>>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: impl Into<Child>) -> Self {
        self.children = children.into();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }
}

/// What a render produces for one position: nothing, text, a single
/// element, or an ordered list of children.
#[derive(Clone, Debug, Default)]
pub enum Child {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Element),
    List(Vec<Child>),
}

impl Child {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Child::Text(text.into())
    }

    pub fn list<C: Into<Child>>(children: impl IntoIterator<Item = C>) -> Self {
        Child::List(children.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Child::Empty)
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<Option<Element>> for Child {
    fn from(element: Option<Element>) -> Self {
        element.map_or(Child::Empty, Child::Element)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.into())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text.into())
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Text(value.to_string().into())
    }
}

impl From<Vec<Child>> for Child {
    fn from(children: Vec<Child>) -> Self {
        Child::List(children)
    }
}

impl From<Vec<Element>> for Child {
    fn from(children: Vec<Element>) -> Self {
        Child::list(children)
    }
}

/// A function component. Two components are the same kind when they share
/// a name and the same render function (or the same closure allocation).
/// The name is part of the identity because the linker may fold distinct
/// `fn`s with identical bodies into one address.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    identity: usize,
    render: Rc<dyn Fn(&Props, &mut Hooks<'_>) -> RenderResult>,
}

impl Component {
    pub fn new(name: &'static str, render: RenderFn) -> Self {
        Self {
            name,
            identity: render as usize,
            render: Rc::new(render),
        }
    }

    /// Closure component. Clone the returned value to keep its identity
    /// across renders; building a new one every render remounts it.
    pub fn from_closure(
        name: &'static str,
        render: impl Fn(&Props, &mut Hooks<'_>) -> RenderResult + 'static,
    ) -> Self {
        let render: Rc<dyn Fn(&Props, &mut Hooks<'_>) -> RenderResult> = Rc::new(render);
        let identity = Rc::as_ptr(&render) as *const () as usize;
        Self {
            name,
            identity,
            render,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props, hooks: &mut Hooks<'_>) -> RenderResult {
        (self.render)(props, hooks)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.name == other.name
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Host(Rc<str>),
    Component(Component),
    Fragment,
}

/// Handle that receives the host instance of the element it is attached to.
#[derive(Clone, Default)]
pub struct NodeRef {
    slot: Rc<RefCell<Option<Box<dyn Any>>>>,
}

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attached host instance, if it has the requested type.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.slot
            .borrow()
            .as_ref()
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub(crate) fn attach(&self, value: Box<dyn Any>) {
        *self.slot.borrow_mut() = Some(value);
    }

    pub(crate) fn detach(&self) {
        self.slot.borrow_mut().take();
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Element {
    element_type: ElementType,
    key: Option<Key>,
    props: Box<Props>,
    node_ref: Option<NodeRef>,
    appended: usize,
}

impl Element {
    fn with_type(element_type: ElementType, props: Props) -> Self {
        Self {
            element_type,
            key: None,
            props: Box::new(props),
            node_ref: None,
            appended: 0,
        }
    }

    pub fn host(tag: impl Into<Rc<str>>) -> Self {
        Self::with_type(ElementType::Host(tag.into()), Props::default())
    }

    pub fn component(component: &Component, props: Props) -> Self {
        Self::with_type(ElementType::Component(component.clone()), props)
    }

    pub fn fragment() -> Self {
        Self::with_type(ElementType::Fragment, Props::default())
    }

    pub fn key(mut self, key: impl fmt::Display) -> Self {
        self.key = Some(key.to_string().into());
        self
    }

    pub fn attr(mut self, name: impl Into<Rc<str>>, value: impl Into<AttrValue>) -> Self {
        self.props.attrs.insert(name.into(), value.into());
        self
    }

    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    /// Appends one child. A single child is stored as-is; a second one turns
    /// the children slot into a list.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        let child = child.into();
        self.props.children = match (self.appended, std::mem::take(&mut self.props.children)) {
            (0, _) => child,
            (1, previous) => Child::List(vec![previous, child]),
            (_, Child::List(mut list)) => {
                list.push(child);
                Child::List(list)
            }
            (_, previous) => Child::List(vec![previous, child]),
        };
        self.appended += 1;
        self
    }

    /// Appends each item as its own child. To pass a list as one child use
    /// `child(Child::list(..))`.
    pub fn children<C: Into<Child>>(self, children: impl IntoIterator<Item = C>) -> Self {
        children.into_iter().fold(self, |element, child| element.child(child))
    }

    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn ref_handle(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.element_type, ElementType::Fragment)
    }

    pub(crate) fn into_parts(self) -> (ElementType, Option<Key>, Props, Option<NodeRef>) {
        (self.element_type, self.key, *self.props, self.node_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_elements_keep_their_children() {
        let tree = Element::host("ul")
            .key("list")
            .child(Element::host("li").child(Element::host("b").child("deep")));

        let Child::Element(li) = &tree.props().children else {
            panic!("expected li, got {:?}", tree.props().children);
        };
        let Child::Element(b) = &li.props().children else {
            panic!("expected b, got {:?}", li.props().children);
        };
        assert!(matches!(&b.props().children, Child::Text(text) if &**text == "deep"));

        let (element_type, key, props, _) = tree.into_parts();
        assert_eq!(element_type, ElementType::Host("ul".into()));
        assert_eq!(key.map(|key| key.to_string()).as_deref(), Some("list"));
        assert!(matches!(props.children, Child::Element(_)));
    }

    fn blank(_: &Props, _: &mut Hooks<'_>) -> RenderResult {
        Ok(Child::Empty)
    }

    fn also_blank(_: &Props, _: &mut Hooks<'_>) -> RenderResult {
        Ok(Child::Empty)
    }

    #[test]
    fn component_kind_needs_matching_name_and_render_fn() {
        assert_eq!(Component::new("Blank", blank), Component::new("Blank", blank));
        assert_ne!(Component::new("Blank", blank), Component::new("AlsoBlank", also_blank));
        assert_ne!(Component::new("Blank", blank), Component::new("Other", blank));

        let closure = Component::from_closure("Blank", |_, _| Ok(Child::Empty));
        assert_eq!(closure, closure.clone());
        assert_ne!(closure, Component::from_closure("Blank", |_, _| Ok(Child::Empty)));
    }

    #[test]
    fn second_child_turns_the_slot_into_a_list() {
        let element = Element::host("p").child("a").child("b").child("c");
        let Child::List(children) = &element.props().children else {
            panic!("expected a list");
        };
        assert_eq!(children.len(), 3);
    }
}
