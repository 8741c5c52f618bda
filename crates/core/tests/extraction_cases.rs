use packspec_core::{
    ExtractionJob, FieldValue, FieldsConfig, Region, RuleSet, SlideFeed, TitleLayouts,
};
use pretty_assertions::assert_eq;

const LAYOUTS: &str = r#"
default: v1
versions:
  v1:
    title: [0.5, 0.3, 24.0, 1.8]
    second_title: [0.5, 2.3, 24.0, 1.2]
"#;

const FIELDS: &str = r#"
profiles:
  发包规范V1:
    master:
      ProjectCode:
        box: [22.17, 1.33, 3.54, 2.11]
    page:
      "1":
        DFM_Info:
          box: [14.44, 15.58, 4.15, 3.23]
          need_split: "\n"
          storage_var: ["", engineer, "", changing_date]
        Nothing:
          box: [40.0, 40.0, 1.0, 1.0]
    title:
      - first: 設備規格及參數
        second: ""
        re:
          dev_failure_rate:
            match_key_string: 故障率
            re_rule: '故障率\s*[:：]\s*(.*?)(?=\n\d+\.|\n\s*$|\n\s*\d+[\.。]|\Z)'
            match_rule: -1
          dev_operation_manpower:
            match_key_string: 機台操作人力
            re_rule: '[机機]台操作人力\s*[:：].*人/[机機]'
            match_rule: -1
      - first: 二.改造方案介紹及模組說明
        second: 1.方案整體概況
        re:
          img_dev_overlooking:
            match_key_string: 3.俯視佈局圖
            re_rule: '(?:\d+[\.。]\s*)?俯[视視][布佈]局[图圖][:：]'
            match_rule: 1
          img_dev_occupancy:
            match_key_string: 4.長寬高尺寸,佔地面積
            re_rule: '(?:\d+[\.。]\s*)?[长長][宽寬]高尺寸\s*[，,]\s*[佔占]地面[積积][:：]'
            match_rule: 5
      - first: 方案版本變更記錄
        table:
          version:
            match_key_string: "報告版本\n（版本號+報告日期）"
          release_date:
            match_key_string: "變更\n日期"
"#;

const FEED: &str = r#"{
  "slides": [
    {
      "page_number": 1,
      "shapes": [
        {"type": "text_box", "box": [14.44, 15.6, 4.15, 3.2],
         "text": "方案中心\n李爱民\n568+42+123456\n2024-01-01"}
      ],
      "master_shapes": [
        {"type": "text_box", "box": [22.2, 1.3, 3.5, 2.1], "text": "PRJ-253"},
        {"type": "image", "box": [0.0, 0.0, 3.0, 1.0]}
      ]
    },
    {
      "page_number": 2,
      "shapes": [
        {"type": "custom_shape", "auto_shape": "RECTANGLE", "box": [0.5, 0.3, 24.0, 1.8],
         "text": "方案版本變更記錄",
         "runs": [{"text": "方案版本變更記錄", "font_size": "27.0pt"}]},
        {"type": "table", "box": [1.0, 3.0, 22.0, 8.0], "cells": [
          [{"text": "報告版本\n（版本號+報告日期）"}, {"text": "變更內容"}, {"text": "變更\n日期"}],
          [{"text": "V1.0"}, {"text": "初版"}, {"text": "2024-01-01"}],
          [{"text": "V1.1"}, {"text": "更新尺寸"}, {"text": "2024-02-15"}],
          [{"text": "3"}, {"text": ""}, {"text": ""}]
        ]}
      ]
    },
    {
      "page_number": 4,
      "shapes": [
        {"type": "text_box", "box": [0.5, 0.3, 24.0, 1.8], "text": "設備規格及參數",
         "runs": [{"text": "設備規格及參數", "font_size": 27.0}]},
        {"type": "text_box", "box": [1.0, 4.0, 12.0, 6.0],
         "text": "1.故障率：≤1.23%\n2.機台操作人力: 1人/機\n"}
      ]
    },
    {
      "page_number": 6,
      "shapes": [
        {"type": "text_box", "box": [0.5, 0.3, 24.0, 1.8], "text": "二.改造方案介紹及模組說明",
         "runs": [{"text": "二.改造方案介紹及模組說明", "font_size": 27.0}]},
        {"type": "text_box", "box": [0.5, 2.3, 24.0, 1.2], "text": "1.方案整體概況",
         "runs": [{"text": "1.方案整體概況", "font_size": 20.0}]},
        {"type": "text_box", "box": [1.0, 4.0, 6.0, 1.0], "text": "3.俯視佈局圖:"},
        {"type": "image", "box": [0.0, 0.5, 3.0, 1.0], "alt_text": "logo above"},
        {"type": "image", "box": [1.0, 5.5, 6.0, 6.0], "alt_text": "layout"},
        {"type": "group", "box": [13.0, 4.0, 10.0, 8.0], "shapes": [
          {"type": "text_box", "box": [13.0, 4.0, 10.0, 1.0], "text": "4.長寬高尺寸，佔地面積:"},
          {"type": "image", "box": [13.0, 5.0, 10.0, 7.0]}
        ]},
        {"type": "chart", "box": [0, 0, 1, 1]}
      ]
    }
  ]
}"#;

fn job() -> ExtractionJob {
    let fields = FieldsConfig::from_yaml_str(FIELDS).expect("valid fields");
    let layouts = TitleLayouts::from_yaml_str(LAYOUTS).expect("valid layouts");
    ExtractionJob::new(
        fields.profile("发包规范V1").expect("profile").clone(),
        layouts.layout(None).expect("layout").clone(),
    )
}

fn bx(coords: [f64; 4]) -> packspec_core::BoundingBox {
    packspec_core::BoundingBox::from_slice(&coords).expect("valid box")
}

#[test]
fn full_deck_extraction() {
    let result = job().run_feed(FEED).expect("extraction succeeds");

    assert_eq!(result.text("ProjectCode"), Some("PRJ-253"));
    assert_eq!(result.text("engineer"), Some("李爱民"));
    assert_eq!(result.text("changing_date"), Some("2024-01-01"));
    assert_eq!(result.text("dev_failure_rate"), Some("≤1.23%"));
    assert_eq!(result.text("dev_utilization_rate"), Some("≥ 98.77%"));
    assert_eq!(result.text("dev_operation_manpower"), Some("1人/機"));
    assert_eq!(result.text("version"), Some("V1.1"));
    assert_eq!(result.text("release_date"), Some("2024-02-15"));

    assert_eq!(
        result.get("img_dev_overlooking"),
        Some(&FieldValue::Region(Region {
            bbox: bx([1.0, 5.5, 6.0, 6.0]),
            page_number: 6,
        }))
    );
    assert_eq!(
        result.region("img_dev_occupancy"),
        Some(&Region {
            bbox: bx([13.0, 4.0, 10.0, 1.0]),
            page_number: 6,
        })
    );
}

#[test]
fn split_discards_unnamed_parts() {
    let result = job().run_feed(FEED).expect("extraction succeeds");
    let keys: Vec<&str> = result.iter().map(|(k, _)| k.as_str()).collect();

    assert!(!keys.contains(&"DFM_Info"));
    assert!(!result
        .iter()
        .any(|(_, v)| v.as_text() == Some("方案中心") || v.as_text() == Some("568+42+123456")));
}

#[test]
fn unmatched_page_box_is_absent_without_error() {
    let result = job().run_feed(FEED).expect("extraction succeeds");
    assert!(!result.contains("Nothing"));
}

#[test]
fn missing_title_slide_skips_block() {
    let feed = r#"{"slides": [{"page_number": 1, "shapes": []}]}"#;
    let result = job().run_feed(feed).expect("extraction succeeds");
    assert!(result.is_empty());
}

#[test]
fn slide_titles_resolved_from_feed() {
    let feed = SlideFeed::from_json_str(FEED).expect("valid feed");
    let slides = job().build_slides(feed.slides).expect("valid slides");

    let titles: Vec<(u32, &str, &str)> = slides
        .iter()
        .map(|s| (s.page_number(), s.title(), s.second_title()))
        .collect();
    assert_eq!(
        titles,
        vec![
            (1, "", ""),
            (2, "方案版本變更記錄", ""),
            (4, "設備規格及參數", ""),
            (6, "二.改造方案介紹及模組說明", "1.方案整體概況"),
        ]
    );
}

#[test]
fn result_serializes_to_exporter_contract() {
    let rules = RuleSet::from_json_str(
        r#"{"page": {"1": {"Owner": {"box": [14.44, 15.58, 4.15, 3.23]}}}}"#,
    )
    .expect("valid rules");
    let layouts = TitleLayouts::from_yaml_str(LAYOUTS).expect("valid layouts");
    let job = ExtractionJob::new(rules, layouts.layout(Some("v1")).expect("layout").clone());

    let result = job.run_feed(FEED).expect("extraction succeeds");
    let json = serde_json::to_value(&result).expect("serializable");
    assert_eq!(
        json,
        serde_json::json!({"Owner": "方案中心\n李爱民\n568+42+123456\n2024-01-01"})
    );
}

#[test]
fn shipped_config_files_load() {
    let fields = FieldsConfig::from_yaml_str(include_str!("../../../config/fields.yaml"))
        .expect("shipped field rules are valid");
    let rules = fields.profile("发包规范V1").expect("profile");
    assert!(rules.field_names().contains(&"dev_failure_rate"));

    let layouts = TitleLayouts::from_yaml_str(include_str!("../../../config/title_positions.yaml"))
        .expect("shipped title positions are valid");
    assert!(layouts.layout(Some("v2")).is_ok());
    assert!(layouts.layout(Some("v9")).is_err());
}

#[test]
fn failure_rate_on_last_line_ends_at_text_end() {
    let feed = r#"{"slides": [{"page_number": 4, "shapes": [
        {"type": "text_box", "box": [0.5, 0.3, 24.0, 1.8], "text": "設備規格及參數",
         "runs": [{"text": "設備規格及參數", "font_size": 27.0}]},
        {"type": "text_box", "box": [1.0, 4.0, 12.0, 6.0],
         "text": "2.機台操作人力: 2人/機\n3.故障率: 0.8%"}
    ]}]}"#;
    let result = job().run_feed(feed).expect("extraction succeeds");

    assert_eq!(result.text("dev_failure_rate"), Some("0.8%"));
    assert_eq!(result.text("dev_utilization_rate"), Some("≥ 99.20%"));
    assert_eq!(result.text("dev_operation_manpower"), Some("2人/機"));
}
