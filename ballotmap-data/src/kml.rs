//! Minimal KML reader.
//!
//! Only the parts of OGC KML that district datasets use are understood:
//! `Placemark` elements at any depth, their `name`, `description` and
//! `ExtendedData`, and `Point`, `Polygon` and `MultiGeometry` geometry.
//! Coordinates keep their optional altitude; flattening to 2D happens in
//! [`crate::geometry`].
//!
//! The document is first read into an element tree with `quick-xml`, and
//! placemarks are then collected from the tree, so the whole document is
//! held in memory.

use std::io::{BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::{Reader, events::Event};
use thiserror::Error;

/// One `lon,lat[,alt]` tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmlCoord {
    /// Longitude in degrees.
    pub x: f64,
    /// Latitude in degrees.
    pub y: f64,
    /// Altitude in metres, when present.
    pub z: Option<f64>,
}

/// Polygon with one outer and any number of inner rings.
#[derive(Debug, Clone, PartialEq)]
pub struct KmlPolygon {
    /// Outer boundary.
    pub outer: Vec<KmlCoord>,
    /// Holes.
    pub inner: Vec<Vec<KmlCoord>>,
}

/// Placemark geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum KmlGeometry {
    /// `<Point>`.
    Point(KmlCoord),
    /// `<Polygon>`.
    Polygon(KmlPolygon),
    /// `<MultiGeometry>`.
    Multi(Vec<KmlGeometry>),
}

/// Fields and geometry of one `<Placemark>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// `name`, `description` and extended data values in document order.
    pub fields: Vec<(String, String)>,
    /// Geometry, if the placemark has any.
    pub geometry: Option<KmlGeometry>,
}

/// Errors raised while reading KML.
#[derive(Debug, Error)]
pub enum KmlError {
    /// The document could not be opened.
    #[error("failed to open {path}")]
    Io {
        /// Document path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document was not well-formed XML.
    #[error("malformed KML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Start and end tags did not match up.
    #[error("unbalanced KML element structure")]
    Unbalanced,
    /// A coordinate tuple could not be parsed.
    #[error("invalid KML coordinate {value:?}")]
    InvalidCoordinate {
        /// Offending tuple.
        value: String,
    },
    /// A geometry element had no usable coordinates.
    #[error("KML {element} has no coordinates")]
    MissingCoordinates {
        /// Geometry element name.
        element: &'static str,
    },
    /// The placemark used a geometry type districts cannot use.
    #[error("unsupported KML geometry {kind}")]
    UnsupportedGeometry {
        /// Element name.
        kind: String,
    },
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn open_element(start: &quick_xml::events::BytesStart<'_>) -> Result<Element, KmlError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        attributes.push((
            local_name(attribute.key.local_name().as_ref()),
            attribute.unescape_value()?.into_owned(),
        ));
    }
    Ok(Element {
        name: local_name(start.local_name().as_ref()),
        attributes,
        ..Element::default()
    })
}

fn parse_tree<R: BufRead>(source: R) -> Result<Element, KmlError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    let mut stack = vec![Element::default()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                stack
                    .last_mut()
                    .ok_or(KmlError::Unbalanced)?
                    .children
                    .push(element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(KmlError::Unbalanced)?;
                stack
                    .last_mut()
                    .ok_or(KmlError::Unbalanced)?
                    .children
                    .push(element);
            }
            Event::Text(text) => {
                let unescaped = text.unescape()?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let root = stack.pop().ok_or(KmlError::Unbalanced)?;
    if stack.is_empty() {
        Ok(root)
    } else {
        Err(KmlError::Unbalanced)
    }
}

fn parse_coordinates(text: &str) -> Result<Vec<KmlCoord>, KmlError> {
    text.split_whitespace()
        .map(|tuple| {
            let invalid = || KmlError::InvalidCoordinate {
                value: tuple.to_owned(),
            };
            let values = tuple
                .split(',')
                .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?;
            match values.as_slice() {
                [x, y] => Ok(KmlCoord {
                    x: *x,
                    y: *y,
                    z: None,
                }),
                [x, y, z] => Ok(KmlCoord {
                    x: *x,
                    y: *y,
                    z: Some(*z),
                }),
                _ => Err(invalid()),
            }
        })
        .collect()
}

fn ring_coordinates(boundary: &Element) -> Result<Vec<Vec<KmlCoord>>, KmlError> {
    boundary
        .children_named("LinearRing")
        .map(|ring| {
            let coordinates = ring
                .child("coordinates")
                .ok_or(KmlError::MissingCoordinates {
                    element: "LinearRing",
                })?;
            parse_coordinates(&coordinates.text)
        })
        .collect()
}

fn parse_geometry(element: &Element) -> Result<Option<KmlGeometry>, KmlError> {
    match element.name.as_str() {
        "Point" => {
            let text = element
                .child("coordinates")
                .map(|coordinates| coordinates.text.as_str())
                .unwrap_or_default();
            let point = parse_coordinates(text)?
                .into_iter()
                .next()
                .ok_or(KmlError::MissingCoordinates { element: "Point" })?;
            Ok(Some(KmlGeometry::Point(point)))
        }
        "Polygon" => {
            let outer = element
                .child("outerBoundaryIs")
                .map(ring_coordinates)
                .transpose()?
                .and_then(|rings| rings.into_iter().next())
                .ok_or(KmlError::MissingCoordinates { element: "Polygon" })?;
            let mut inner = Vec::new();
            for boundary in element.children_named("innerBoundaryIs") {
                inner.extend(ring_coordinates(boundary)?);
            }
            Ok(Some(KmlGeometry::Polygon(KmlPolygon { outer, inner })))
        }
        "MultiGeometry" => {
            let mut members = Vec::new();
            for child in &element.children {
                if let Some(member) = parse_geometry(child)? {
                    members.push(member);
                }
            }
            Ok(Some(KmlGeometry::Multi(members)))
        }
        "LineString" | "LinearRing" | "Model" | "Track" | "MultiTrack" => {
            Err(KmlError::UnsupportedGeometry {
                kind: element.name.clone(),
            })
        }
        _ => Ok(None),
    }
}

fn extended_fields(extended: &Element, fields: &mut Vec<(String, String)>) {
    for data in extended.children_named("Data") {
        if let Some(name) = data.attribute("name") {
            let value = data
                .child("value")
                .map(|value| value.text.clone())
                .unwrap_or_default();
            fields.push((name.to_owned(), value));
        }
    }
    for schema in extended.children_named("SchemaData") {
        for simple in schema.children_named("SimpleData") {
            if let Some(name) = simple.attribute("name") {
                fields.push((name.to_owned(), simple.text.clone()));
            }
        }
    }
}

fn to_placemark(element: &Element) -> Result<Placemark, KmlError> {
    let mut fields = Vec::new();
    let mut geometry = None;
    for child in &element.children {
        match child.name.as_str() {
            "name" | "description" => fields.push((child.name.clone(), child.text.clone())),
            "ExtendedData" => extended_fields(child, &mut fields),
            _ => {
                if geometry.is_none() {
                    geometry = parse_geometry(child)?;
                }
            }
        }
    }
    Ok(Placemark { fields, geometry })
}

fn collect_placemarks(element: &Element, out: &mut Vec<Placemark>) -> Result<(), KmlError> {
    for child in &element.children {
        if child.name == "Placemark" {
            out.push(to_placemark(child)?);
        } else {
            collect_placemarks(child, out)?;
        }
    }
    Ok(())
}

/// Read every placemark in document order.
///
/// # Examples
/// ```
/// use ballotmap_data::kml::{KmlGeometry, read_placemarks};
///
/// let kml = r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
///   <Placemark><name>North</name><Point><coordinates>-0.1,51.5,0</coordinates></Point></Placemark>
/// </Document></kml>"#;
/// let placemarks = read_placemarks(kml.as_bytes())?;
/// assert_eq!(placemarks[0].fields, [("name".to_owned(), "North".to_owned())]);
/// assert!(matches!(placemarks[0].geometry, Some(KmlGeometry::Point(_))));
/// # Ok::<(), ballotmap_data::kml::KmlError>(())
/// ```
pub fn read_placemarks<R: BufRead>(source: R) -> Result<Vec<Placemark>, KmlError> {
    let root = parse_tree(source)?;
    let mut placemarks = Vec::new();
    collect_placemarks(&root, &mut placemarks)?;
    Ok(placemarks)
}

/// Read every placemark of the KML document at `path`.
pub fn read_placemarks_from_path(path: &Utf8Path) -> Result<Vec<Placemark>, KmlError> {
    let file = ballotmap_fs::open_std_file(path).map_err(|source| KmlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_placemarks(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DOCUMENT: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Folder>
      <Placemark>
        <name>Abbey &amp; Castle</name>
        <ExtendedData>
          <Data name="District Code"><value>AB</value></Data>
          <SchemaData schemaUrl="#s"><SimpleData name="WARD">Abbey</SimpleData></SchemaData>
        </ExtendedData>
        <Polygon>
          <outerBoundaryIs><LinearRing><coordinates>
            -1.0,51.0,10 -0.9,51.0,10 -0.9,51.1,10 -1.0,51.0,10
          </coordinates></LinearRing></outerBoundaryIs>
          <innerBoundaryIs><LinearRing><coordinates>
            -0.95,51.02 -0.92,51.02 -0.92,51.03 -0.95,51.02
          </coordinates></LinearRing></innerBoundaryIs>
        </Polygon>
      </Placemark>
    </Folder>
    <Placemark>
      <name>Split</name>
      <description><![CDATA[Two <b>parts</b>]]></description>
      <MultiGeometry>
        <Polygon><outerBoundaryIs><LinearRing><coordinates>0,0 1,0 1,1 0,0</coordinates></LinearRing></outerBoundaryIs></Polygon>
        <Polygon><outerBoundaryIs><LinearRing><coordinates>2,0 3,0 3,1 2,0</coordinates></LinearRing></outerBoundaryIs></Polygon>
      </MultiGeometry>
    </Placemark>
    <Placemark><name>Empty</name></Placemark>
  </Document>
</kml>"##;

    #[rstest]
    fn reads_nested_placemarks_with_extended_data() {
        let placemarks = read_placemarks(DOCUMENT.as_bytes()).expect("valid KML");
        assert_eq!(placemarks.len(), 3);

        let first = &placemarks[0];
        assert_eq!(
            first.fields,
            [
                ("name".to_owned(), "Abbey & Castle".to_owned()),
                ("District Code".to_owned(), "AB".to_owned()),
                ("WARD".to_owned(), "Abbey".to_owned()),
            ]
        );
        let Some(KmlGeometry::Polygon(polygon)) = &first.geometry else {
            panic!("expected a polygon, got {:?}", first.geometry);
        };
        assert_eq!(polygon.outer.len(), 4);
        assert_eq!(polygon.outer[0].z, Some(10.0));
        assert_eq!(polygon.inner.len(), 1);
        assert_eq!(polygon.inner[0][0].z, None);
    }

    #[rstest]
    fn reads_multi_geometry_and_cdata() {
        let placemarks = read_placemarks(DOCUMENT.as_bytes()).expect("valid KML");
        let split = &placemarks[1];
        assert_eq!(split.fields[1].1, "Two <b>parts</b>");
        assert!(matches!(&split.geometry, Some(KmlGeometry::Multi(members)) if members.len() == 2));
        assert!(placemarks[2].geometry.is_none());
    }

    #[rstest]
    #[case("1.0")]
    #[case("a,b")]
    #[case("1,2,3,4")]
    fn rejects_malformed_coordinates(#[case] tuple: &str) {
        let kml = format!(
            "<kml><Placemark><Point><coordinates>{tuple}</coordinates></Point></Placemark></kml>"
        );
        let err = read_placemarks(kml.as_bytes()).expect_err("bad coordinate");
        assert!(matches!(err, KmlError::InvalidCoordinate { value } if value == tuple));
    }

    #[rstest]
    fn rejects_line_strings() {
        let kml = "<kml><Placemark><LineString><coordinates>0,0 1,1</coordinates></LineString></Placemark></kml>";
        let err = read_placemarks(kml.as_bytes()).expect_err("line string");
        assert!(matches!(err, KmlError::UnsupportedGeometry { kind } if kind == "LineString"));
    }

    #[rstest]
    fn rejects_truncated_documents() {
        let err = read_placemarks("<kml><Document><Placemark>".as_bytes())
            .expect_err("truncated");
        assert!(matches!(err, KmlError::Unbalanced | KmlError::Xml(_)));
    }
}
