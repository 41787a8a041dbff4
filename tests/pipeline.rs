use std::fs;
use std::path::Path;
use tempfile::TempDir;

use pocket_poem::catalog;
use pocket_poem::config::Config;
use pocket_poem::db;
use pocket_poem::ingest;
use pocket_poem::models::NormalizedPoem;
use pocket_poem::pipeline;
use pocket_poem::progress::NoProgress;
use pocket_poem::{collections, convert};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup_corpus(root: &Path) {
    write(
        &root.join("全唐诗/poet.tang.0.json"),
        r#"[
  {"author": "李白", "title": "静夜思", "paragraphs": ["床前明月光，疑是地上霜。", "举头望明月，低头思故乡。"]},
  {"author": "杜甫", "title": "春望", "paragraphs": ["国破山河在，城春草木深。"]}
]"#,
    );
    write(&root.join("全唐诗/poet.tang.1.json"), "[{\"author\": ");
    write(
        &root.join("全唐诗/poet.tang.2.json"),
        r#"[{"author": "王维", "title": "鹿柴", "paragraphs": ["空山不见人，但闻人语响。"]},
            {"author": "王维", "title": "空", "paragraphs": []}]"#,
    );
    write(
        &root.join("宋词/ci.song.0.json"),
        r#"[{"author": "苏轼", "rhythmic": "水调歌头", "paragraphs": ["明月几时有？把酒问青天。"]}]"#,
    );
    write(
        &root.join("蒙学/tangshisanbaishou.json"),
        r#"{"title": "唐诗三百首", "content": [
  {"type": "五言绝句", "content": [
    {"chapter": "静夜思", "subchapter": "静夜思", "author": "李白", "paragraphs": ["床前明月光，疑是地上霜。", "举头望明月，低头思故乡。"]}
  ]}
]}"#,
    );

    write(
        &root.join("rank/poet/poet.tang.rank.0.json"),
        r#"[
  {"author": "李白", "title": "静夜思", "baidu": 100, "google": 3},
  {"author": "杜甫", "title": "春望", "bing": 10},
  {"author": "王之涣", "title": "登鹳雀楼", "so360": 5}
]"#,
    );
    write(
        &root.join("rank/ci/ci.song.rank.0.json"),
        r#"[{"author": "苏轼", "rhythmic": "水调歌头", "baidu": 50}]"#,
    );
}

fn test_config(tmp: &Path, extra: &str) -> Config {
    let text = format!(
        r#"[db]
path = "{root}/out/pocket_poem.db"

[corpus]
root = "{root}/poems"
progress_every = 2

[ranking]
dir = "{root}/poems/rank"
output = "{root}/out/popular-poems.json"
top_n = 300

[conversion]
report = "{root}/out/conversion_report.json"
{extra}
"#,
        root = tmp.display(),
        extra = extra
    );
    let config: Config = toml::from_str(&text).unwrap();
    pocket_poem::config::validate(&config).unwrap();
    config
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    setup_corpus(&tmp.path().join("poems"));
    let config = test_config(tmp.path(), "");
    (tmp, config)
}

async fn rows_for_dynasty(config: &Config, dynasty: &str) -> Vec<NormalizedPoem> {
    let pool = db::connect_existing(config).await.unwrap();
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT title, author, dynasty, content FROM poems WHERE dynasty = ? ORDER BY id",
    )
    .bind(dynasty)
    .fetch_all(&pool)
    .await
    .unwrap();
    pool.close().await;
    rows.into_iter()
        .map(|(title, author, dynasty, content)| NormalizedPoem {
            title,
            author,
            dynasty,
            content,
        })
        .collect()
}

#[tokio::test]
async fn build_loads_every_readable_file_and_skips_the_corrupt_one() {
    let (_tmp, config) = setup();

    let summary = ingest::build_database(&config, &NoProgress).await.unwrap();

    assert!(!summary.replaced_existing);
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].path.ends_with("poet.tang.1.json"));
    // 3 tang (one blank record dropped) + 1 ci + 1 anthology
    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.dynasties, 2);
}

#[tokio::test]
async fn stored_rows_match_normalized_records_exactly() {
    let (_tmp, config) = setup();
    ingest::build_database(&config, &NoProgress).await.unwrap();

    let expected: Vec<NormalizedPoem> = catalog::resolve_catalog(&config.corpus.root)
        .unwrap()
        .iter()
        .filter(|d| d.dynasty == "唐")
        .filter_map(|d| ingest::read_source(d).ok())
        .flatten()
        .collect();

    let stored = rows_for_dynasty(&config, "唐").await;
    assert_eq!(stored, expected);
    assert_eq!(stored[0].content, "床前明月光，疑是地上霜。\n举头望明月，低头思故乡。");
    assert!(stored.iter().all(|p| !p.content.trim().is_empty()));
}

#[tokio::test]
async fn rebuild_replaces_instead_of_appending() {
    let (_tmp, config) = setup();
    ingest::build_database(&config, &NoProgress).await.unwrap();
    let second = ingest::build_database(&config, &NoProgress).await.unwrap();

    assert!(second.replaced_existing);
    let pool = db::connect_existing(&config).await.unwrap();
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poems")
        .fetch_one(&pool)
        .await
        .unwrap();
    let defaults: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE is_default = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;

    assert_eq!(total, 5);
    assert_eq!(defaults, 1);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let (_tmp, config) = setup();
    let summary = ingest::run_build(&config, true, &NoProgress).await.unwrap();

    assert_eq!(summary.total_rows, 5);
    assert!(!config.db.path.exists());
}

#[tokio::test]
async fn pipeline_marks_one_row_per_shortlisted_pair() {
    let (_tmp, config) = setup();

    let summary = pipeline::run_pipeline(&config, false, &NoProgress)
        .await
        .unwrap();

    assert!(summary.conversion.is_none());
    assert_eq!(summary.shortlist.records.len(), 4);
    assert_eq!(summary.marks.unmatched, 1);
    assert_eq!(summary.marks.marked, 3);
    assert_eq!(summary.marks.hot_total, 3);
    assert!(config.ranking.output.exists());

    // 静夜思 is in both the tang corpus and the anthology; only the first row is hot.
    let pool = db::connect_existing(&config).await.unwrap();
    let hot: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT id, hot FROM poems WHERE title = '静夜思' AND author = '李白' ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    pool.close().await;

    assert_eq!(hot.len(), 2);
    assert_eq!(hot[0].1, 1);
    assert_eq!(hot[1].1, 0);
}

#[tokio::test]
async fn converted_variant_is_loaded_instead_of_the_original() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("poems");
    write(
        &root.join("曹操诗集/caocao.json"),
        r#"[{"title": "觀滄海", "paragraphs": ["東臨碣石，以觀滄海。"]}]"#,
    );
    write(
        &tmp.path().join("dict/TSCharacters.txt"),
        "觀\t观\n滄\t沧\n東\t东\n臨\t临\n",
    );

    let config = test_config(
        tmp.path(),
        &format!(
            "[[conversion.stages]]\nfiles = [\"{}/dict/TSCharacters.txt\"]\n",
            tmp.path().display()
        ),
    );

    let report = convert::run_conversion(&config, true, &NoProgress).unwrap();
    assert_eq!(report.successful, 1);
    assert!(config.conversion.report.exists());
    assert!(root.join("曹操诗集/caocao.simplified.json").exists());

    let summary = ingest::build_database(&config, &NoProgress).await.unwrap();
    assert_eq!(summary.total_rows, 1);

    let rows = rows_for_dynasty(&config, "汉").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "观沧海");
    assert_eq!(rows[0].author, "曹操");
    assert_eq!(rows[0].content, "东临碣石，以观沧海。");
}

#[test]
fn builtin_stage_converts_without_dictionary_files() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("poems");
    write(
        &root.join("曹操诗集/caocao.json"),
        r#"[{"title": "觀滄海", "paragraphs": ["東臨碣石，以觀滄海。"]}]"#,
    );
    let config = test_config(tmp.path(), "[[conversion.stages]]\nbuiltin = \"zh-cn\"\n");

    let report = convert::run_conversion(&config, true, &NoProgress).unwrap();
    assert_eq!(report.successful, 1);

    let converted = fs::read_to_string(root.join("曹操诗集/caocao.simplified.json")).unwrap();
    assert!(converted.contains("观沧海"));
    assert!(converted.contains("东临碣石，以观沧海。"));
}

#[tokio::test]
async fn collections_survive_until_the_next_build() {
    let (_tmp, config) = setup();
    ingest::build_database(&config, &NoProgress).await.unwrap();

    let pool = db::connect_existing(&config).await.unwrap();
    let default = collections::default_collection(&pool).await.unwrap().unwrap();
    collections::add_poem(&pool, default.id, 1).await.unwrap();
    assert_eq!(
        collections::collection_poem_count(&pool, default.id).await.unwrap(),
        1
    );

    // Deleting the poem cascades to the item.
    sqlx::query("DELETE FROM poems WHERE id = 1")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(
        collections::collection_poem_count(&pool, default.id).await.unwrap(),
        0
    );
    pool.close().await;
}
