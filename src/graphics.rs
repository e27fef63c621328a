use crate::{
    config_patch::write_atomic_text,
    error::{LaunchResult, LauncherError},
    profile::{GraphicsSetting, Profile},
};
use quick_xml::{
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use std::{fs, path::Path};

pub const GRAPHICS_TAG: &str = "graphics";
pub const VIDEO_TAG: &str = "video";
pub const MSAA_TAG: &str = "MSAA";
pub const FXAA_TAG: &str = "FXAA_Enabled";

/// Element written for a setting. AntiAliasing has no single element; it is
/// split across `MSAA` and `FXAA_Enabled`.
pub fn element_tag(setting: GraphicsSetting) -> Option<&'static str> {
    match setting {
        GraphicsSetting::TextureQuality => Some("TextureQuality"),
        GraphicsSetting::ShaderQuality => Some("ShaderQuality"),
        GraphicsSetting::ShadowQuality => Some("ShadowQuality"),
        GraphicsSetting::ReflectionQuality => Some("ReflectionQuality"),
        GraphicsSetting::WaterQuality => Some("WaterQuality"),
        GraphicsSetting::GrassQuality => Some("GrassQuality"),
        GraphicsSetting::AnisotropicFiltering => Some("AnisotropicFiltering"),
        GraphicsSetting::AmbientOcclusion => Some("SSAO"),
        GraphicsSetting::VSync => Some("VSync"),
        GraphicsSetting::AntiAliasing => None,
    }
}

/// Stored code for a display label. Unknown labels fall back to `"0"`.
pub fn value_code(label: &str) -> &'static str {
    match label {
        "Off" | "Normal" => "0",
        "On" | "High" => "1",
        "Half" | "Very High" | "x2" => "2",
        "Ultra" => "3",
        "x4" => "4",
        "x8" => "8",
        "x16" => "16",
        _ => "0",
    }
}

/// `(MSAA level, FXAA enabled)` for an anti-aliasing label.
pub fn anti_aliasing_codes(label: &str) -> (String, &'static str) {
    if let Some(rest) = label.strip_prefix("MSAA") {
        let level = rest
            .trim()
            .trim_start_matches(|c| c == 'x' || c == 'X')
            .parse::<u32>()
            .map(|level| level.to_string())
            .unwrap_or_else(|_| "0".to_string());
        return (level, "false");
    }
    if label == "FXAA" {
        return ("0".to_string(), "true");
    }
    ("0".to_string(), "false")
}

/// Rewrites the graphics and video values in a GTA V `settings.xml`.
pub fn patch_graphics_xml(path: &Path, profile: &Profile) -> LaunchResult<()> {
    if !path.is_file() {
        return Err(LauncherError::FileNotFound(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|err| LauncherError::io(path, err))?;
    let mut document = XmlDocument::parse(&raw).map_err(|message| LauncherError::XmlParse {
        path: path.to_path_buf(),
        message,
    })?;
    apply_settings(&mut document.root, profile);
    let xml = document.to_xml_string().map_err(|message| LauncherError::XmlParse {
        path: path.to_path_buf(),
        message,
    })?;
    write_atomic_text(path, &xml)
}

pub fn apply_settings(root: &mut Element, profile: &Profile) {
    let graphics = root.child_or_insert(GRAPHICS_TAG);
    for setting in GraphicsSetting::ALL {
        if matches!(setting, GraphicsSetting::AntiAliasing | GraphicsSetting::VSync) {
            continue;
        }
        if let Some(tag) = element_tag(setting) {
            graphics
                .child_or_insert(tag)
                .set_attribute("value", value_code(profile.graphics_value(setting)));
        }
    }

    let (msaa, fxaa) = anti_aliasing_codes(profile.graphics_value(GraphicsSetting::AntiAliasing));
    graphics.child_or_insert(MSAA_TAG).set_attribute("value", &msaa);
    graphics.child_or_insert(FXAA_TAG).set_attribute("value", fxaa);

    let video = root.child_or_insert(VIDEO_TAG);
    video
        .child_or_insert("VSync")
        .set_attribute("value", value_code(profile.graphics_value(GraphicsSetting::VSync)));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Removes whitespace-only text once the element holds child elements or
    /// comments. Text-only elements keep their content verbatim.
    fn drop_layout_whitespace(&mut self) {
        let structured = self
            .children
            .iter()
            .any(|node| matches!(node, Node::Element(_) | Node::Comment(_)));
        if structured {
            self.children
                .retain(|node| !matches!(node, Node::Text(text) if text.trim().is_empty()));
        }
    }

    /// First child element called `name`, appended when absent.
    pub fn child_or_insert(&mut self, name: &str) -> &mut Element {
        let position = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(element) if element.name == name));
        let index = match position {
            Some(index) => index,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.drop_layout_whitespace();
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            Node::Element(element) => element,
            _ => unreachable!("index points at an element"),
        }
    }
}

/// Minimal XML tree: comments around the root, the root element, nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub prolog: Vec<Node>,
    pub root: Element,
    pub epilog: Vec<Node>,
}

impl XmlDocument {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut reader = Reader::from_str(raw);

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|err| format!("{err} (at byte {position})"))?;
            match event {
                Event::Start(e) => stack.push(element_from_start(&e)?),
                Event::Empty(e) => {
                    let element = element_from_start(&e)?;
                    attach(Node::Element(element), &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| format!("unexpected closing tag at byte {position}"))?;
                    element.drop_layout_whitespace();
                    attach(Node::Element(element), &mut stack, &mut root)?;
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| err.to_string())?.into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None if text.trim().is_empty() => {}
                        None => return Err(format!("text outside the root element at byte {position}")),
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::CData(text));
                    }
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    let node = Node::Comment(text);
                    match (stack.last_mut(), root.is_some()) {
                        (Some(parent), _) => parent.children.push(node),
                        (None, false) => prolog.push(node),
                        (None, true) => epilog.push(node),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }
        let root = root.ok_or_else(|| "document has no root element".to_string())?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// UTF-8 text with an XML declaration and two-space indentation.
    pub fn to_xml_string(&self) -> Result<String, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let mut write = || -> quick_xml::Result<()> {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            for node in &self.prolog {
                write_node(&mut writer, node)?;
            }
            write_element(&mut writer, &self.root)?;
            for node in &self.epilog {
                write_node(&mut writer, node)?;
            }
            Ok(())
        };
        write().map_err(|err| err.to_string())?;
        let mut xml = String::from_utf8(writer.into_inner()).map_err(|err| err.to_string())?;
        xml.push('\n');
        Ok(xml)
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(node: Node, stack: &mut [Element], root: &mut Option<Element>) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    match node {
        Node::Element(element) if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        Node::Element(element) => Err(format!("second root element <{}>", element.name)),
        _ => Ok(()),
    }
}

fn write_node<W: std::io::Write>(writer: &mut Writer<W>, node: &Node) -> quick_xml::Result<()> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text))),
        Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str()))),
        Node::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
        }
    }
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }
    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Settings version="27">
  <!-- written by the game -->
  <configSource>SMC_AUTO</configSource>
  <graphics>
    <Tessellation value="1" />
    <TextureQuality value="2" />
    <LodScale value="1.000000" />
  </graphics>
  <video>
    <Windowed value="0" />
    <VSync value="2" />
  </video>
  <VideoCardDescription>Vendor &amp; Card</VideoCardDescription>
</Settings>
"#;

    fn profile_with(settings: &[(GraphicsSetting, &str)]) -> Profile {
        let mut profile = Profile::default();
        for (setting, value) in settings {
            profile.graphics_settings.insert(*setting, value.to_string());
        }
        profile
    }

    fn value_of<'a>(root: &'a Element, section: &str, tag: &str) -> Option<&'a str> {
        root.child(section)?.child(tag)?.attribute("value")
    }

    fn patched(profile: &Profile) -> Element {
        let mut document = XmlDocument::parse(SETTINGS).unwrap();
        apply_settings(&mut document.root, profile);
        document.root
    }

    #[test]
    fn anti_aliasing_decomposes_into_msaa_and_fxaa() {
        for (label, msaa, fxaa) in [
            ("MSAA x4", "4", "false"),
            ("FXAA", "0", "true"),
            ("Off", "0", "false"),
        ] {
            let root = patched(&profile_with(&[(GraphicsSetting::AntiAliasing, label)]));
            assert_eq!(value_of(&root, "graphics", "MSAA"), Some(msaa), "{label}");
            assert_eq!(value_of(&root, "graphics", "FXAA_Enabled"), Some(fxaa), "{label}");
        }
    }

    #[test]
    fn codes_follow_the_translation_table() {
        let root = patched(&profile_with(&[
            (GraphicsSetting::TextureQuality, "High"),
            (GraphicsSetting::ShadowQuality, "Ultra"),
            (GraphicsSetting::AnisotropicFiltering, "x4"),
            (GraphicsSetting::AmbientOcclusion, "Off"),
            (GraphicsSetting::VSync, "Off"),
        ]));
        assert_eq!(value_of(&root, "graphics", "TextureQuality"), Some("1"));
        assert_eq!(value_of(&root, "graphics", "ShadowQuality"), Some("3"));
        assert_eq!(value_of(&root, "graphics", "AnisotropicFiltering"), Some("4"));
        assert_eq!(value_of(&root, "graphics", "SSAO"), Some("0"));
        assert_eq!(value_of(&root, "video", "VSync"), Some("0"));
        assert!(value_of(&root, "graphics", "VSync").is_none());
    }

    #[test]
    fn unrecognized_labels_fall_back_to_zero() {
        assert_eq!(value_code("Cinematic"), "0");
        assert_eq!(anti_aliasing_codes("MSAA lots"), ("0".to_string(), "false"));
        let root = patched(&profile_with(&[(GraphicsSetting::WaterQuality, "Cinematic")]));
        assert_eq!(value_of(&root, "graphics", "WaterQuality"), Some("0"));
    }

    #[test]
    fn unrelated_elements_and_attributes_survive() {
        let root = patched(&Profile::default());
        assert_eq!(root.attribute("version"), Some("27"));
        assert_eq!(value_of(&root, "graphics", "Tessellation"), Some("1"));
        assert_eq!(value_of(&root, "graphics", "LodScale"), Some("1.000000"));
        assert_eq!(value_of(&root, "video", "Windowed"), Some("0"));
        let description = root.child("VideoCardDescription").unwrap();
        assert_eq!(description.children, vec![Node::Text("Vendor & Card".to_string())]);
        assert!(root
            .children
            .iter()
            .any(|node| matches!(node, Node::Comment(text) if text.contains("written by the game"))));
    }

    #[test]
    fn padded_text_is_written_back_verbatim() {
        let raw = "<Settings>\n  <Note>  padded text  </Note>\n  <Empty>   </Empty>\n  <graphics>\n  </graphics>\n</Settings>\n";
        let mut document = XmlDocument::parse(raw).unwrap();
        apply_settings(&mut document.root, &Profile::default());
        let written = document.to_xml_string().unwrap();
        assert!(written.contains("<Note>  padded text  </Note>"), "{written}");
        assert!(written.contains("<Empty>   </Empty>"), "{written}");

        let reparsed = XmlDocument::parse(&written).unwrap();
        let note = reparsed.root.child("Note").unwrap();
        assert_eq!(note.children, vec![Node::Text("  padded text  ".to_string())]);
        let graphics = reparsed.root.child("graphics").unwrap();
        assert!(graphics
            .children
            .iter()
            .all(|node| matches!(node, Node::Element(_))));
        assert_eq!(reparsed.to_xml_string().unwrap(), written);
    }

    #[test]
    fn missing_sections_are_created() {
        let mut document = XmlDocument::parse("<Settings><audio volume=\"3\"/></Settings>").unwrap();
        apply_settings(&mut document.root, &Profile::default());
        let root = &document.root;
        assert_eq!(root.child("audio").and_then(|audio| audio.attribute("volume")), Some("3"));
        assert_eq!(value_of(root, "graphics", "TextureQuality"), Some("1"));
        assert_eq!(value_of(root, "graphics", "FXAA_Enabled"), Some("true"));
        assert_eq!(value_of(root, "video", "VSync"), Some("1"));
    }

    #[test]
    fn patch_rewrites_file_with_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.xml");
        fs::write(&path, format!("\u{feff}{SETTINGS}")).unwrap();

        let profile = profile_with(&[(GraphicsSetting::AntiAliasing, "MSAA x8")]);
        patch_graphics_xml(&path, &profile).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(written.contains("Vendor &amp; Card"));
        let reparsed = XmlDocument::parse(&written).unwrap();
        assert_eq!(value_of(&reparsed.root, "graphics", "MSAA"), Some("8"));
        assert_eq!(value_of(&reparsed.root, "graphics", "Tessellation"), Some("1"));

        patch_graphics_xml(&path, &profile).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.xml");
        assert!(matches!(
            patch_graphics_xml(&path, &Profile::default()),
            Err(LauncherError::FileNotFound(_))
        ));

        fs::write(&path, "<Settings><graphics></Settings>").unwrap();
        assert!(matches!(
            patch_graphics_xml(&path, &Profile::default()),
            Err(LauncherError::XmlParse { .. })
        ));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<Settings><graphics></Settings>"
        );
    }
}
