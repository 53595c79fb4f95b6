//! In-memory PDF builders for unit tests

use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// ToUnicode CMap mapping CIDs 1..=4 to 甲方盖章
pub const CJK_TO_UNICODE: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0001> <7532>
<0002> <65B9>
endbfchar
1 beginbfrange
<0003> <0004> [<76D6> <7AE0>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

pub struct TestPage {
    pub width: i64,
    pub height: i64,
    pub content: String,
}

impl TestPage {
    pub fn a4() -> Self {
        Self::sized(595, 842)
    }

    pub fn letter() -> Self {
        Self::sized(612, 792)
    }

    pub fn sized(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            content: String::new(),
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }
}

/// Build a PDF whose pages share Helvetica as /F1 and a CJK Type0 font as /F2
pub fn build_pdf(pages: &[TestPage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let cmap_id = doc.add_object(Stream::new(
        Dictionary::new(),
        CJK_TO_UNICODE.as_bytes().to_vec(),
    ));
    let descendant = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType0",
        "BaseFont" => "ABCDEF+SimSun",
        "DW" => 1000,
    });
    let cjk = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "ABCDEF+SimSun",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(descendant)],
        "ToUnicode" => cmap_id,
    });
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => helvetica,
            "F2" => cjk,
        },
    });

    let mut kids = Vec::new();
    for page in pages {
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            page.content.clone().into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
