#![no_main]

use libfuzzer_sys::fuzz_target;
use regmap_core::classify::imx::{classify_row, classify_text_line};
use regmap_core::classify::stm32::{
    classify_chapter_line, classify_map_row, repair_wrapped_heading, ChapterEnd, FieldStage,
};
use regmap_core::{classify_cell, extract_bits, parse_range};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(end) = ChapterEnd::new("53.8", &["DDRCTRL registers summary".to_string()]) else {
        return;
    };

    let mut previous: Option<&str> = None;
    for line in text.lines() {
        let _ = classify_text_line(line);
        let _ = classify_cell(line);
        let _ = repair_wrapped_heading(line, previous);
        for stage in [FieldStage::Offset, FieldStage::Reset, FieldStage::Bits] {
            let _ = classify_chapter_line(line, &end, stage);
        }
        if let Ok(range) = parse_range(line) {
            if range.width().is_some_and(|width| width <= 128) {
                let _ = extract_bits("0xFFFFFFFF", range, false);
            }
        }
        previous = Some(line);
    }

    let cells: Vec<Option<String>> = text
        .split('|')
        .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
        .collect();
    let _ = classify_row(&cells, false);
    let _ = classify_row(&cells, true);
    let _ = classify_map_row(&cells);
});
