use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use signease_core::PdfRect;

/// Line advance as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.2;

/// Encode `text` for a Type1 font with WinAnsiEncoding.
///
/// Characters outside the encoding become `?`; the count of replacements is
/// returned alongside the bytes.
pub fn encode_win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = text
        .chars()
        .map(|ch| {
            win_ansi_byte(ch).unwrap_or_else(|| {
                replaced += 1;
                b'?'
            })
        })
        .collect();
    (bytes, replaced)
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x09 => Some(b' '),
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => {
            let byte = match ch {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                _ => return None,
            };
            Some(byte)
        }
    }
}

/// Operations drawing `text` in black at `font_size`, first baseline at the
/// rectangle's origin. Further lines step downwards.
pub fn text_operations(font: &str, text: &str, rect: &PdfRect, font_size: f64) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)]),
        Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), Object::Real(font_size as f32)]),
        Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(rect.x as f32),
                Object::Real(rect.y as f32),
            ],
        ),
    ];

    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            ops.push(Operation::new(
                "Td",
                vec![Object::Integer(0), Object::Real(-(font_size * LINE_HEIGHT) as f32)],
            ));
        }
        let (bytes, replaced) = encode_win_ansi(line);
        if replaced > 0 {
            log::warn!("[Flatten] {} character(s) not representable in Helvetica, drawn as '?'", replaced);
        }
        ops.push(Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)]));
    }

    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Operations painting image XObject `name` into `rect`.
pub fn image_operations(name: &str, rect: &PdfRect) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(rect.width as f32),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(rect.height as f32),
                Object::Real(rect.x as f32),
                Object::Real(rect.y as f32),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}
