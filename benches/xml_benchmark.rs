use divan::Bencher;
use libxml_bridge::{Document, DocumentOptions, Dtd, Writer, WriterOutput};

fn main() {
    divan::main();
}

const NOTE_DTD: &str = r#"<!ELEMENT note (to, from, body)>
<!ELEMENT to (#PCDATA)>
<!ELEMENT from (#PCDATA)>
<!ELEMENT body (#PCDATA)>
"#;

const VALID_XML: &str = r#"<?xml version="1.0"?>
<note><to>Tove</to><from>Jani</from><body>Hello</body></note>"#;

#[divan::bench]
fn parse_dtd(bencher: Bencher) {
    bencher.bench_local(|| Dtd::parse_str(NOTE_DTD).expect("Failed to parse DTD"));
}

#[divan::bench]
fn validate_document(bencher: Bencher) {
    let dtd = Dtd::parse_str(NOTE_DTD).unwrap();
    let document = Document::parse_str(VALID_XML).unwrap();

    bencher.bench_local(move || document.validate(&dtd).expect("Validation failed"));
}

#[divan::bench(args = [10, 100, 1000])]
fn write_string_sink(bencher: Bencher, items: usize) {
    bencher.bench_local(move || {
        let mut writer = Writer::string().unwrap();
        writer.start_document(&DocumentOptions::default());
        writer.start_element("items");
        for n in 0..items {
            writer.start_element("item");
            writer.write_attribute("n", &n.to_string());
            writer.write_string("content & more");
            writer.end_element();
        }
        writer.end_document();
        writer.result().unwrap().and_then(WriterOutput::into_text)
    });
}

#[divan::bench(args = [10, 100, 1000])]
fn write_document_sink(bencher: Bencher, items: usize) {
    bencher.bench_local(move || {
        let mut writer = Writer::document().unwrap();
        writer.start_document(&DocumentOptions::default());
        writer.start_element("items");
        for _ in 0..items {
            writer.write_element("item", Some("content"));
        }
        writer.end_document();
        writer.close();
        writer.result().unwrap().and_then(WriterOutput::into_document)
    });
}

#[divan::bench]
fn write_to_byte_sink(bencher: Bencher) {
    bencher.bench_local(|| {
        let mut writer = Writer::stream(std::io::sink()).unwrap();
        writer.start_element("root");
        for _ in 0..100 {
            writer.write_element("item", Some("content"));
        }
        writer.end_element();
        writer.flush(true).unwrap()
    });
}
