//! The element and menu graph scripts build their UI from

use std::collections::HashMap;

use crate::host::Host;
use crate::value::HostValue;

/// Index of an element in the engine-owned element list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

/// RGBA color, channels in `0.0..=1.0`
pub type Color = [f32; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorzAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl HorzAlign {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

impl VertAlign {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "top" => Some(Self::Top),
            "middle" => Some(Self::Middle),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

/// Source rectangle of a sliced material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for Slice {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
        }
    }
}

/// A UI leaf node
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub x_scale: f32,
    pub y_scale: f32,
    pub rotation: f32,
    pub style: i32,

    pub color: Color,
    pub second_color: Color,
    pub glow_color: Color,
    pub background_color: Color,
    pub border_color: Color,
    pub use_gradient: bool,
    /// top, right, bottom, left
    pub border_width: [f32; 4],

    pub font: String,
    pub fontsize: i32,
    pub text: String,
    pub material: String,
    pub horzalign: HorzAlign,
    pub vertalign: VertAlign,
    pub text_offset: (f32, f32),
    pub slice: Slice,

    pub hidden: bool,
    /// Pointer is over the element, tracked by input dispatch
    pub hovered: bool,
    pub attributes: HashMap<String, HostValue>,
}

impl Default for Element {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 0.0,
            h: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
            rotation: 0.0,
            style: 0,
            color: [1.0, 1.0, 1.0, 1.0],
            second_color: [0.0; 4],
            glow_color: [0.0; 4],
            background_color: [0.0; 4],
            border_color: [0.0; 4],
            use_gradient: false,
            border_width: [0.0; 4],
            font: "default".to_string(),
            fontsize: 20,
            text: String::new(),
            material: "white".to_string(),
            horzalign: HorzAlign::default(),
            vertalign: VertAlign::default(),
            text_offset: (0.0, 0.0),
            slice: Slice::default(),
            hidden: false,
            hovered: false,
            attributes: HashMap::new(),
        }
    }
}

impl Element {
    pub fn set_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.x = x;
        self.y = y;
        self.w = w;
        self.h = h;
    }

    /// CSS-style shorthand: one value for every edge, two for vertical and
    /// horizontal, three for top / horizontal / bottom, four for each edge
    pub fn set_border_width(&mut self, widths: &[f32]) {
        self.border_width = match *widths {
            [all] => [all; 4],
            [vertical, horizontal] => [vertical, horizontal, vertical, horizontal],
            [top, horizontal, bottom] => [top, horizontal, bottom, horizontal],
            [top, right, bottom, left, ..] => [top, right, bottom, left],
            [] => self.border_width,
        };
    }

    pub fn set_second_color(&mut self, color: Color) {
        self.use_gradient = true;
        self.second_color = color;
    }

    /// Bounding box including the borders
    pub fn outer_rect(&self) -> (f32, f32, f32, f32) {
        let [top, right, bottom, left] = self.border_width;
        (self.x, self.y, self.w + right + left, self.h + top + bottom)
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        let (x, y, w, h) = self.outer_rect();
        px >= x && px < x + w && py >= y && py < y + h
    }

    fn matches(&self, attribute: &str, value: &HostValue) -> bool {
        self.attributes
            .get(attribute)
            .is_some_and(|stored| stored.script_eq(value))
    }
}

/// How a menu gets its visuals
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MenuKind {
    #[default]
    Normal,
    /// Mirrors the host-native menu of that name
    Overlay { bound: String },
}

/// An element container, non-owning over its children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Menu {
    pub children: Vec<ElementId>,
    pub cursor: bool,
    pub hidden: bool,
    pub ignoreevents: bool,
    pub visible: bool,
    pub kind: MenuKind,
    pub attributes: HashMap<String, HostValue>,
}

impl Menu {
    pub fn overlay(bound: impl Into<String>) -> Self {
        Self {
            kind: MenuKind::Overlay {
                bound: bound.into(),
            },
            ..Self::default()
        }
    }

    pub fn add_child(&mut self, element: ElementId) {
        self.children.push(element);
    }

    pub fn open(&mut self) {
        self.visible = true;
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    /// Open locally, or (for overlays) open on the host side
    pub fn is_open(&self, host: &dyn Host) -> bool {
        match &self.kind {
            MenuKind::Normal => self.visible,
            MenuKind::Overlay { bound } => self.visible || host.is_menu_open(bound),
        }
    }
}

/// Engine-wide element list and name-keyed menu map
#[derive(Debug, Default)]
pub struct ObjectModel {
    elements: Vec<Element>,
    menus: HashMap<String, Menu>,
}

impl ObjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&mut self) -> ElementId {
        self.elements.push(Element::default());
        ElementId(self.elements.len() - 1)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Every element, in creation order
    pub fn element_ids(&self) -> Vec<ElementId> {
        (0..self.elements.len()).map(ElementId).collect()
    }

    /// Insert a menu, replacing any menu of the same name
    pub fn insert_menu(&mut self, name: impl Into<String>, menu: Menu) {
        self.menus.insert(name.into(), menu);
    }

    pub fn menu(&self, name: &str) -> Option<&Menu> {
        self.menus.get(name)
    }

    pub fn menu_mut(&mut self, name: &str) -> Option<&mut Menu> {
        self.menus.get_mut(name)
    }

    pub fn has_menu(&self, name: &str) -> bool {
        self.menus.contains_key(name)
    }

    pub fn menus(&self) -> impl Iterator<Item = (&String, &Menu)> {
        self.menus.iter()
    }

    /// First element, in creation order, whose `attribute` equals `value`
    pub fn find_element(&self, value: &HostValue, attribute: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .position(|e| e.matches(attribute, value))
            .map(ElementId)
    }

    /// Every element whose `attribute` equals `value`
    pub fn find_elements(&self, value: &HostValue, attribute: &str) -> Vec<ElementId> {
        self.filter(self.element_ids(), value, attribute)
    }

    /// First child of `menu` whose `attribute` equals `value`
    pub fn find_child(&self, menu: &str, value: &HostValue, attribute: &str) -> Option<ElementId> {
        let menu = self.menus.get(menu)?;
        menu.children
            .iter()
            .copied()
            .find(|id| self.element(*id).is_some_and(|e| e.matches(attribute, value)))
    }

    /// Every child of `menu` whose `attribute` equals `value`
    pub fn find_children(&self, menu: &str, value: &HostValue, attribute: &str) -> Vec<ElementId> {
        match self.menus.get(menu) {
            Some(menu) => self.filter(menu.children.clone(), value, attribute),
            None => Vec::new(),
        }
    }

    fn filter(&self, ids: Vec<ElementId>, value: &HostValue, attribute: &str) -> Vec<ElementId> {
        ids.into_iter()
            .filter(|id| self.element(*id).is_some_and(|e| e.matches(attribute, value)))
            .collect()
    }

    /// Topmost visible element under the pointer across menus that are open
    /// and accept events; later children draw over earlier ones
    pub fn hit_test(&self, x: f32, y: f32, host: &dyn Host) -> Option<ElementId> {
        let mut names: Vec<&String> = self.menus.keys().collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| self.menus.get(name))
            .filter(|menu| !menu.ignoreevents && !menu.hidden && menu.is_open(host))
            .flat_map(|menu| menu.children.iter().copied())
            .filter(|id| {
                self.element(*id)
                    .is_some_and(|e| !e.hidden && e.contains(x, y))
            })
            .last()
    }

    /// Drop every element and menu
    pub fn clear(&mut self) {
        self.elements.clear();
        self.menus.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    #[test]
    fn test_border_width_shorthand() {
        let mut element = Element::default();

        element.set_border_width(&[2.0]);
        assert_eq!(element.border_width, [2.0; 4]);

        element.set_border_width(&[1.0, 3.0]);
        assert_eq!(element.border_width, [1.0, 3.0, 1.0, 3.0]);

        element.set_border_width(&[1.0, 2.0, 3.0]);
        assert_eq!(element.border_width, [1.0, 2.0, 3.0, 2.0]);

        element.set_border_width(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(element.border_width, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_outer_rect_includes_borders() {
        let mut element = Element::default();
        element.set_rect(10.0, 20.0, 100.0, 50.0);
        element.set_border_width(&[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(element.outer_rect(), (10.0, 20.0, 106.0, 54.0));
    }

    #[test]
    fn test_find_by_attribute_in_creation_order() {
        let mut model = ObjectModel::new();
        let a = model.create_element();
        let b = model.create_element();
        let c = model.create_element();
        let tag = HostValue::from("button");
        for id in [a, c] {
            if let Some(element) = model.element_mut(id) {
                element.attributes.insert("kind".to_string(), tag.clone());
            }
        }

        assert_eq!(model.find_element(&tag, "kind"), Some(a));
        assert_eq!(model.find_elements(&tag, "kind"), vec![a, c]);
        assert_eq!(model.find_element(&HostValue::from("label"), "kind"), None);

        let mut menu = Menu::default();
        menu.add_child(b);
        menu.add_child(c);
        model.insert_menu("main", menu);
        assert_eq!(model.find_child("main", &tag, "kind"), Some(c));
        assert_eq!(model.find_children("main", &tag, "kind"), vec![c]);
    }

    #[test]
    fn test_overlay_menu_follows_host() {
        let host = HeadlessHost::new();
        let menu = Menu::overlay("main_menu");
        assert!(!menu.is_open(&host));

        host.set_menu_open("main_menu", true);
        assert!(menu.is_open(&host));

        let normal = Menu::default();
        assert!(!normal.is_open(&host));
    }

    #[test]
    fn test_hit_test_picks_topmost_child() {
        let host = HeadlessHost::new();
        let mut model = ObjectModel::new();
        let below = model.create_element();
        let above = model.create_element();
        for id in [below, above] {
            if let Some(element) = model.element_mut(id) {
                element.set_rect(0.0, 0.0, 100.0, 100.0);
            }
        }

        let mut menu = Menu::default();
        menu.add_child(below);
        menu.add_child(above);
        model.insert_menu("hud", menu);

        assert_eq!(model.hit_test(50.0, 50.0, &host), None);

        if let Some(menu) = model.menu_mut("hud") {
            menu.open();
        }
        assert_eq!(model.hit_test(50.0, 50.0, &host), Some(above));
        assert_eq!(model.hit_test(150.0, 50.0, &host), None);

        if let Some(menu) = model.menu_mut("hud") {
            menu.ignoreevents = true;
        }
        assert_eq!(model.hit_test(50.0, 50.0, &host), None);
    }
}
