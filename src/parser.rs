use crate::cast;
use crate::config::{SourceFormat, SKIP_PROGRESS_INTERVAL};
use crate::keys::KeyRegistry;
use crate::loader::BatchLoader;
use crate::models::{EdgeRecord, PropertyType, VertexRecord};
use crate::store::GraphStore;
use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use indicatif::ProgressBar;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// Open a GraphML source for streaming. `.bz2` files are decompressed on
/// the fly; everything else is read as plain XML.
pub fn open_source(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open GraphML file: {}", path.display()))?;
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"))
    {
        Ok(Box::new(BufReader::new(BzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// The element the parser is currently inside. GraphML never nests graph
/// elements, so one slot is the whole context stack.
enum OpenElement {
    Vertex(VertexRecord),
    Edge(EdgeRecord),
}

/// Single-pass streaming GraphML parser.
///
/// Drives a pull-based XML event stream and dispatches on four tags: `key`
/// declarations feed the [`KeyRegistry`], `node`/`edge` open an element
/// context, and nested `data` elements fill it with typed properties.
/// Completed elements are handed to the [`BatchLoader`].
///
/// The first `skip_items` completed elements are parsed (keeping the key
/// registry consistent) but never emitted; once the skip window closes the
/// loader's throughput timers reset. With `num_items > 0` the parse stops
/// after that many post-skip elements, leaving the rest of the stream
/// unread. All malformed input is fatal; there is no element-level
/// recovery.
pub struct GraphmlParser {
    format: SourceFormat,
    registry: KeyRegistry,
    open: Option<OpenElement>,
    in_data: bool,
    data_key: Option<String>,
    text: String,
    skip_remaining: u64,
    skipped: u64,
    limit: u64,
    spinner: Option<ProgressBar>,
}

impl GraphmlParser {
    pub fn new(format: SourceFormat, skip_items: u64, num_items: u64) -> Self {
        Self {
            format,
            registry: KeyRegistry::new(),
            open: None,
            in_data: false,
            data_key: None,
            text: String::new(),
            skip_remaining: skip_items,
            skipped: 0,
            limit: num_items,
            spinner: None,
        }
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Run the parse loop to end of stream, skip/limit permitting.
    pub fn run<R: BufRead, S: GraphStore>(
        &mut self,
        input: R,
        loader: &mut BatchLoader<'_, S>,
    ) -> Result<()> {
        let mut reader = Reader::from_reader(input);
        let mut buf = Vec::new();

        if self.skip_remaining > 0 {
            info!(items = self.skip_remaining, "Skipping items");
            self.spinner = Some(ProgressBar::new_spinner());
        }

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .with_context(|| format!("XML parse error at byte {}", reader.buffer_position()))?;
            match event {
                Event::Start(ref e) => self.handle_start(e, false, loader)?,
                Event::Empty(ref e) => self.handle_start(e, true, loader)?,
                Event::Text(ref t) => {
                    if self.in_data {
                        let text = t.unescape().with_context(|| {
                            format!(
                                "Invalid text content at byte {}",
                                reader.buffer_position()
                            )
                        })?;
                        self.text.push_str(&text);
                    }
                }
                Event::CData(ref t) => {
                    if self.in_data {
                        self.text.push_str(&String::from_utf8_lossy(t));
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"data" => self.close_data()?,
                    b"node" | b"edge" => self.finalize(loader)?,
                    _ => {}
                },
                Event::Eof => {
                    // The reader reports a plain Eof even with unclosed
                    // tags, so a half-read element means truncated input.
                    if self.open.is_some() || self.in_data {
                        bail!(
                            "Unexpected end of input at byte {}: element still open",
                            reader.buffer_position()
                        );
                    }
                    break;
                }
                _ => {}
            }
            buf.clear();

            if self.limit > 0 && loader.total_items() >= self.limit {
                info!(items = self.limit, "Item limit reached, stopping parse");
                break;
            }
        }

        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        Ok(())
    }

    fn handle_start<S: GraphStore>(
        &mut self,
        e: &BytesStart<'_>,
        empty: bool,
        loader: &mut BatchLoader<'_, S>,
    ) -> Result<()> {
        let name = e.local_name();
        if self.in_data {
            bail!(
                "Unexpected <{}> element inside a <data> value",
                String::from_utf8_lossy(name.as_ref())
            );
        }
        match name.as_ref() {
            b"key" => self.handle_key(e),
            b"node" => {
                if self.open.is_some() {
                    bail!("Unexpected <node> while another element is open");
                }
                let raw = require_attr(e, "id", "node")?;
                let id = self
                    .format
                    .decode_id(&raw)
                    .context("Invalid vertex identifier")?;
                self.open = Some(OpenElement::Vertex(VertexRecord::new(id)));
                if empty {
                    self.finalize(loader)?;
                }
                Ok(())
            }
            b"edge" => {
                if self.open.is_some() {
                    bail!("Unexpected <edge> while another element is open");
                }
                let id = self
                    .format
                    .decode_id(&require_attr(e, "id", "edge")?)
                    .context("Invalid edge identifier")?;
                let source = self
                    .format
                    .decode_id(&require_attr(e, "source", "edge")?)
                    .with_context(|| format!("Invalid source identifier on edge {id}"))?;
                let target = self
                    .format
                    .decode_id(&require_attr(e, "target", "edge")?)
                    .with_context(|| format!("Invalid target identifier on edge {id}"))?;
                self.open = Some(OpenElement::Edge(EdgeRecord::new(id, source, target)));
                if empty {
                    self.finalize(loader)?;
                }
                Ok(())
            }
            b"data" => {
                self.text.clear();
                if self.open.is_some() {
                    self.data_key = Some(require_attr(e, "key", "data")?);
                } else {
                    // Graph-level metadata, not a vertex/edge property.
                    debug!("Ignoring <data> outside any node or edge");
                    self.data_key = None;
                }
                if empty {
                    self.in_data = true;
                    self.close_data()
                } else {
                    self.in_data = true;
                    Ok(())
                }
            }
            // graphml, graph, desc and friends carry nothing we load.
            _ => Ok(()),
        }
    }

    fn handle_key(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let id = require_attr(e, "id", "key")?;
        let name = attr(e, "attr.name")?;
        let ty = PropertyType::from_attr(attr(e, "attr.type")?.as_deref());
        self.registry.register(&id, name.as_deref(), ty);
        Ok(())
    }

    /// Close the current `<data>` element: assign a label or cast and store
    /// a property on the open element.
    fn close_data(&mut self) -> Result<()> {
        self.in_data = false;
        let Some(key) = self.data_key.take() else {
            self.text.clear();
            return Ok(());
        };
        let value = std::mem::take(&mut self.text);
        match self.open.as_mut() {
            Some(OpenElement::Vertex(vertex)) => {
                if key == self.format.vertex_label_key() {
                    vertex.label = Some(self.format.vertex_label_value(&value).to_string());
                } else {
                    let ty = self.registry.resolve_type(&key);
                    let cast = cast::cast(ty, &value).with_context(|| {
                        format!("Failed to cast property {key:?} on vertex {}", vertex.id)
                    })?;
                    vertex.set_property(self.registry.resolve_name(&key).to_string(), cast);
                }
            }
            Some(OpenElement::Edge(edge)) => {
                if key == self.format.edge_label_key() {
                    edge.label = Some(value);
                } else {
                    let ty = self.registry.resolve_type(&key);
                    let cast = cast::cast(ty, &value).with_context(|| {
                        format!("Failed to cast property {key:?} on edge {}", edge.id)
                    })?;
                    edge.set_property(self.registry.resolve_name(&key).to_string(), cast);
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Close the open vertex/edge: skip it, or hand it to the loader.
    fn finalize<S: GraphStore>(&mut self, loader: &mut BatchLoader<'_, S>) -> Result<()> {
        let Some(open) = self.open.take() else {
            bail!("Unexpected closing tag with no element open");
        };

        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            self.skipped += 1;
            if let Some(pb) = &self.spinner {
                if self.skipped % SKIP_PROGRESS_INTERVAL == 0 {
                    pb.tick();
                }
            }
            if self.skip_remaining == 0 {
                if let Some(pb) = self.spinner.take() {
                    pb.finish_and_clear();
                }
                info!(items = self.skipped, "Done skipping");
                loader.reset_timers();
            }
            return Ok(());
        }

        match open {
            OpenElement::Vertex(vertex) => loader.emit_vertex(&vertex),
            OpenElement::Edge(edge) => loader.emit_edge(&edge),
        }
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let Some(a) = e
        .try_get_attribute(name)
        .with_context(|| format!("Malformed {name:?} attribute"))?
    else {
        return Ok(None);
    };
    let value = a
        .unescape_value()
        .with_context(|| format!("Malformed {name:?} attribute value"))?;
    Ok(Some(value.into_owned()))
}

fn require_attr(e: &BytesStart<'_>, name: &str, tag: &str) -> Result<String> {
    attr(e, name)?.with_context(|| format!("Missing {name:?} attribute on <{tag}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyValue;
    use crate::store::MemoryStore;

    fn parse(
        xml: &str,
        format: SourceFormat,
        skip: u64,
        limit: u64,
        batch_size: u64,
    ) -> Result<MemoryStore> {
        let mut store = MemoryStore::new();
        {
            let mut loader = BatchLoader::new(&mut store, batch_size, false);
            let mut parser = GraphmlParser::new(format, skip, limit);
            parser.run(xml.as_bytes(), &mut loader)?;
            loader.final_commit()?;
        }
        Ok(store)
    }

    fn parse_ok(xml: &str, format: SourceFormat) -> MemoryStore {
        parse(xml, format, 0, 0, 0).unwrap()
    }

    #[test]
    fn single_vertex_with_string_property() {
        let store = parse_ok(
            r#"<graphml><graph>
                <key id="NAME" for="node" attr.name="NAME" attr.type="string"></key>
                <node id="1"><data key="NAME">Ada</data></node>
            </graph></graphml>"#,
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows.len(), 1);
        let row = &store.vertex_rows[0];
        assert_eq!(row.vid, 1);
        assert_eq!(row.label, "vertex");
        assert_eq!(row.key.as_deref(), Some("NAME"));
        assert_eq!(row.value.as_deref(), Some("Ada"));
        assert_eq!(row.numeric_value, None);
    }

    #[test]
    fn declared_int_key_casts_value() {
        let store = parse_ok(
            r#"<graphml>
                <key id="AGE" for="node" attr.name="AGE" attr.type="int"></key>
                <node id="1"><data key="AGE">37</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        let row = &store.vertex_rows[0];
        assert_eq!(row.type_code, Some(2));
        assert_eq!(row.value.as_deref(), Some("37"));
        assert_eq!(row.numeric_value.as_deref(), Some("37"));
    }

    #[test]
    fn undeclared_key_casts_as_string() {
        let store = parse_ok(
            r#"<graphml><node id="1"><data key="NOTE">42</data></node></graphml>"#,
            SourceFormat::Tinkerpop,
        );
        let row = &store.vertex_rows[0];
        assert_eq!(row.type_code, Some(1));
        assert_eq!(row.numeric_value, None);
    }

    #[test]
    fn malformed_numeric_property_aborts_the_run() {
        let err = parse(
            r#"<graphml>
                <key id="AGE" attr.name="AGE" attr.type="int"></key>
                <node id="1"><data key="AGE">abc</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("AGE"));
    }

    #[test]
    fn tinkerpop_labels_used_verbatim() {
        let store = parse_ok(
            r#"<graphml>
                <node id="1"><data key="labelV">Person</data></node>
                <node id="2"></node>
                <edge id="10" source="1" target="2"><data key="labelE">KNOWS</data></edge>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows[0].label, "Person");
        assert_eq!(store.vertex_rows[1].label, "vertex");
        assert_eq!(store.edge_rows[0].label, "KNOWS");
    }

    #[test]
    fn neo4j_ids_and_labels_decoded() {
        let store = parse_ok(
            r#"<graphml>
                <node id="v12"><data key="labels">:Person</data></node>
                <node id="v13"/>
                <edge id="e7" source="v12" target="v13"><data key="label">KNOWS</data></edge>
            </graphml>"#,
            SourceFormat::Neo4j,
        );
        assert_eq!(store.vertex_rows[0].vid, 12);
        assert_eq!(store.vertex_rows[0].label, "Person");
        assert_eq!(store.vertex_rows[1].vid, 13);
        let edge = &store.edge_rows[0];
        assert_eq!(edge.eid, 7);
        assert_eq!(edge.svid, 12);
        assert_eq!(edge.dvid, 13);
        assert_eq!(edge.label, "KNOWS");
    }

    #[test]
    fn neo4j_id_without_prefix_in_tinkerpop_mode_fails() {
        assert!(parse(
            r#"<graphml><node id="v12"/></graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
    }

    #[test]
    fn property_less_elements_emit_null_rows() {
        let store = parse_ok(
            r#"<graphml>
                <node id="1"/>
                <node id="2"><data key="labelV">Person</data></node>
                <node id="3"><data key="X">a</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        // Labels are not properties; nodes 1 and 2 both get null rows.
        let null_rows = store
            .vertex_rows
            .iter()
            .filter(|r| r.key.is_none())
            .count();
        assert_eq!(null_rows, 2);
        assert_eq!(store.vertex_rows.len(), 3);
    }

    #[test]
    fn key_declared_after_use_does_not_apply_retroactively() {
        let store = parse_ok(
            r#"<graphml>
                <node id="1"><data key="AGE">37</data></node>
                <key id="AGE" attr.name="AGE" attr.type="int"></key>
                <node id="2"><data key="AGE">40</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows[0].type_code, Some(1));
        assert_eq!(store.vertex_rows[1].type_code, Some(2));
    }

    #[test]
    fn key_display_name_used_for_rows() {
        let store = parse_ok(
            r#"<graphml>
                <key id="d0" attr.name="WEIGHT" attr.type="double"></key>
                <node id="1"><data key="d0">1.5</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        let row = &store.vertex_rows[0];
        assert_eq!(row.key.as_deref(), Some("WEIGHT"));
        assert_eq!(row.type_code, Some(4));
    }

    #[test]
    fn last_write_wins_per_property_key() {
        let store = parse_ok(
            r#"<graphml>
                <node id="1"><data key="X">a</data><data key="X">b</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows.len(), 1);
        assert_eq!(store.vertex_rows[0].value.as_deref(), Some("b"));
    }

    #[test]
    fn skip_window_suppresses_emission_but_not_keys() {
        let store = parse(
            r#"<graphml>
                <key id="AGE" attr.name="AGE" attr.type="int"></key>
                <node id="1"><data key="AGE">10</data></node>
                <node id="2"><data key="AGE">20</data></node>
                <node id="3"><data key="AGE">30</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
            2,
            0,
            0,
        )
        .unwrap();
        assert_eq!(store.vertex_rows.len(), 1);
        assert_eq!(store.vertex_rows[0].vid, 3);
        // Key declared before the skip window still applies after it.
        assert_eq!(store.vertex_rows[0].type_code, Some(2));
    }

    #[test]
    fn skip_then_limit_selects_document_window() {
        // Elements at document positions [1, 3) of the combined sequence.
        let store = parse(
            r#"<graphml>
                <node id="1"/>
                <node id="2"/>
                <edge id="10" source="1" target="2"/>
                <node id="3"/>
                <node id="4"/>
            </graphml>"#,
            SourceFormat::Tinkerpop,
            1,
            2,
            0,
        )
        .unwrap();
        assert_eq!(store.vertex_rows.len(), 1);
        assert_eq!(store.vertex_rows[0].vid, 2);
        assert_eq!(store.edge_rows.len(), 1);
        assert_eq!(store.edge_rows[0].eid, 10);
    }

    #[test]
    fn limit_stops_mid_stream() {
        let store = parse(
            r#"<graphml>
                <node id="1"/>
                <node id="2"/>
                <node id="3"/>
            </graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            2,
            0,
        )
        .unwrap();
        assert_eq!(store.vertex_rows.len(), 2);
        assert_eq!(store.vertex_rows[1].vid, 2);
    }

    #[test]
    fn skip_larger_than_stream_emits_nothing() {
        let store = parse(
            r#"<graphml><node id="1"/><node id="2"/></graphml>"#,
            SourceFormat::Tinkerpop,
            10,
            0,
            0,
        )
        .unwrap();
        assert!(store.vertex_rows.is_empty());
        assert!(store.edge_rows.is_empty());
    }

    #[test]
    fn boolean_and_long_properties() {
        let store = parse_ok(
            r#"<graphml>
                <key id="OK" attr.name="OK" attr.type="boolean"></key>
                <key id="N" attr.name="N" attr.type="long"></key>
                <node id="1"><data key="OK">True</data><data key="N">5000000000</data></node>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        let ok = &store.vertex_rows[0];
        assert_eq!(ok.type_code, Some(6));
        assert_eq!(ok.value.as_deref(), Some("true"));
        assert_eq!(ok.numeric_value, None);
        let n = &store.vertex_rows[1];
        assert_eq!(n.type_code, Some(7));
        assert_eq!(n.numeric_value.as_deref(), Some("5000000000"));
    }

    #[test]
    fn edge_properties_cast_like_vertex_properties() {
        let store = parse_ok(
            r#"<graphml>
                <key id="WEIGHT" attr.name="WEIGHT" attr.type="double"></key>
                <node id="1"/><node id="2"/>
                <edge id="10" source="1" target="2">
                    <data key="labelE">LINKS</data>
                    <data key="WEIGHT">0.25</data>
                </edge>
            </graphml>"#,
            SourceFormat::Tinkerpop,
        );
        let edge = &store.edge_rows[0];
        assert_eq!(edge.label, "LINKS");
        assert_eq!(edge.key.as_deref(), Some("WEIGHT"));
        assert_eq!(edge.type_code, Some(4));
        assert_eq!(edge.numeric_value.as_deref(), Some("0.25"));
    }

    #[test]
    fn graph_level_data_is_ignored() {
        let store = parse_ok(
            r#"<graphml><graph><data key="meta">whatever</data>
                <node id="1"/>
            </graph></graphml>"#,
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows.len(), 1);
        assert!(store.vertex_rows[0].key.is_none());
    }

    #[test]
    fn element_inside_data_is_fatal() {
        assert!(parse(
            r#"<graphml><node id="1"><data key="X"><b>bold</b></data></node></graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
    }

    #[test]
    fn nested_graph_elements_are_fatal() {
        assert!(parse(
            r#"<graphml><node id="1"><node id="2"/></node></graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
    }

    #[test]
    fn missing_identifier_attribute_is_fatal() {
        assert!(parse(
            r#"<graphml><node></node></graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
        assert!(parse(
            r#"<graphml><edge id="1" source="1"></edge></graphml>"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
    }

    #[test]
    fn truncated_xml_is_fatal() {
        assert!(parse(
            r#"<graphml><node id="1">"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
    }

    #[test]
    fn input_ending_inside_data_is_fatal() {
        // Graph-level metadata, so no element is open; the unterminated
        // <data> value alone must fail the run.
        assert!(parse(
            r#"<graphml><data key="meta">tex"#,
            SourceFormat::Tinkerpop,
            0,
            0,
            0,
        )
        .is_err());
    }

    #[test]
    fn empty_data_element_yields_empty_string_property() {
        let store = parse_ok(
            r#"<graphml><node id="1"><data key="NOTE"/></node></graphml>"#,
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows[0].value.as_deref(), Some(""));
    }

    #[test]
    fn property_values_keep_surrounding_whitespace() {
        let store = parse_ok(
            "<graphml><node id=\"1\"><data key=\"NOTE\"> a b </data></node></graphml>",
            SourceFormat::Tinkerpop,
        );
        assert_eq!(store.vertex_rows[0].value.as_deref(), Some(" a b "));
    }

    #[test]
    fn registry_is_exposed_after_the_run() {
        let mut store = MemoryStore::new();
        let mut loader = BatchLoader::new(&mut store, 0, false);
        let mut parser = GraphmlParser::new(SourceFormat::Tinkerpop, 0, 0);
        parser
            .run(
                r#"<graphml><key id="X" attr.name="X" attr.type="float"></key></graphml>"#
                    .as_bytes(),
                &mut loader,
            )
            .unwrap();
        assert_eq!(parser.registry().len(), 1);
        assert_eq!(
            cast::cast(parser.registry().resolve_type("X"), "1.5").unwrap(),
            PropertyValue::Float(1.5)
        );
    }
}
