use assert_cmd::prelude::*;

use predicates::prelude::*;
use predicates::str::contains;
use serial_test::serial;
use std::process::Command;

/// `wardrobe` with an isolated data root and no network-related settings
fn wardrobe_cmd(root: &assert_fs::TempDir) -> Command {
  let mut cmd = Command::cargo_bin("wardrobe").expect("binary exists");
  cmd
    .env("WARDROBE_ROOT", root.path())
    .env("NO_COLOR", "1")
    .env_remove("GEMINI_API_KEY")
    .env_remove("WARDROBE_API_BASE")
    .env_remove("WARDROBE_LAT")
    .env_remove("WARDROBE_LON")
    .env_remove("RUST_LOG");
  cmd
}

fn write_photo(root: &assert_fs::TempDir, name: &str) -> std::path::PathBuf {
  let path = root.path().join(name);
  std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]).unwrap();
  path
}

/// Add an item without analysis and return its id
fn add_item(root: &assert_fs::TempDir, photo: &str, category: &str, color: &str) -> String {
  let path = write_photo(root, photo);
  let output = wardrobe_cmd(root)
    .args(["add", "--no-analyze", "--category", category, "--color", color])
    .arg(&path)
    .output()
    .unwrap();

  assert!(output.status.success(), "add failed: {}", String::from_utf8_lossy(&output.stderr));
  let stdout = String::from_utf8(output.stdout).unwrap();
  stdout.split_whitespace().last().unwrap().to_string()
}

#[test]
#[serial]
fn test_add_list_and_filter() {
  let temp = assert_fs::TempDir::new().unwrap();

  let shoe = add_item(&temp, "shoe.png", "运动鞋", "白色");
  add_item(&temp, "jeans.png", "牛仔裤", "黑色");

  wardrobe_cmd(&temp)
    .args(["list"])
    .assert()
    .success()
    .stdout(contains("白色 运动鞋").and(contains("黑色 牛仔裤")).and(contains("never worn")));

  wardrobe_cmd(&temp)
    .args(["list", "--group", "footwear"])
    .assert()
    .success()
    .stdout(contains(shoe.as_str()).and(contains("牛仔裤").not()));

  wardrobe_cmd(&temp)
    .args(["list", "--query", "黑"])
    .assert()
    .success()
    .stdout(contains("黑色 牛仔裤").and(contains("运动鞋").not()));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_add_without_tags_uses_manual_defaults() {
  let temp = assert_fs::TempDir::new().unwrap();
  let path = write_photo(&temp, "mystery.jpg");

  wardrobe_cmd(&temp).args(["add", "--no-analyze"]).arg(&path).assert().success();

  wardrobe_cmd(&temp)
    .args(["list"])
    .assert()
    .success()
    .stdout(contains("无色 未命名").and(contains("四季通用")).and(contains("休闲")));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_add_rejects_missing_photo() {
  let temp = assert_fs::TempDir::new().unwrap();

  wardrobe_cmd(&temp)
    .args(["add", "--no-analyze", "does-not-exist.png"])
    .assert()
    .failure()
    .stderr(contains("Failed to read image"));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_wear_and_stats() {
  let temp = assert_fs::TempDir::new().unwrap();

  let shirt = add_item(&temp, "shirt.png", "衬衫", "米白");
  let jeans = add_item(&temp, "jeans.png", "牛仔裤", "藏青");
  add_item(&temp, "scarf.png", "围巾", "红");

  wardrobe_cmd(&temp)
    .args(["wear", &shirt, &jeans])
    .assert()
    .success()
    .stdout(contains("Marked 2 item(s) as worn"));

  wardrobe_cmd(&temp)
    .args(["stats"])
    .assert()
    .success()
    .stdout(contains("Items:        3").and(contains("Worn:         2")).and(contains("67%")));

  wardrobe_cmd(&temp)
    .args(["list", "--query", "米白"])
    .assert()
    .success()
    .stdout(contains("1×").and(contains("worn today")));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_remove() {
  let temp = assert_fs::TempDir::new().unwrap();
  let id = add_item(&temp, "coat.png", "大衣", "驼色");

  wardrobe_cmd(&temp).args(["remove", &id]).assert().success().stdout(contains("Removed"));

  wardrobe_cmd(&temp).args(["list"]).assert().success().stdout(contains("No items found"));

  wardrobe_cmd(&temp)
    .args(["remove", "no-such-id"])
    .assert()
    .success()
    .stderr(contains("No item with id no-such-id"));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_profile_show_and_set() {
  let temp = assert_fs::TempDir::new().unwrap();

  wardrobe_cmd(&temp)
    .args(["profile"])
    .assert()
    .success()
    .stdout(contains("主人").and(contains("Female")).and(contains("Height: -")));

  wardrobe_cmd(&temp)
    .args(["profile", "set", "--name", "小王", "--gender", "male", "--height", "180"])
    .assert()
    .success()
    .stdout(contains("Profile updated"));

  wardrobe_cmd(&temp)
    .args(["profile"])
    .assert()
    .success()
    .stdout(contains("小王").and(contains("Male")).and(contains("Height: 180")).and(contains("Weight: -")));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_profile_avatar_round_trip() {
  let temp = assert_fs::TempDir::new().unwrap();
  let avatar = write_photo(&temp, "me.png");

  wardrobe_cmd(&temp).args(["profile", "set", "--avatar"]).arg(&avatar).assert().success();
  wardrobe_cmd(&temp).args(["profile"]).assert().success().stdout(contains("Avatar: set"));

  wardrobe_cmd(&temp).args(["profile", "set", "--clear-avatar"]).assert().success();
  wardrobe_cmd(&temp).args(["profile"]).assert().success().stdout(contains("Avatar: -"));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_corrupt_data_is_treated_as_empty() {
  let temp = assert_fs::TempDir::new().unwrap();
  std::fs::write(temp.path().join("wardrobe_items_cn.json"), "{not json").unwrap();
  std::fs::write(temp.path().join("user_profile_cn.json"), "[]").unwrap();

  wardrobe_cmd(&temp).args(["list"]).assert().success().stdout(contains("No items found"));
  wardrobe_cmd(&temp).args(["profile"]).assert().success().stdout(contains("主人"));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_config_redacts_key() {
  let temp = assert_fs::TempDir::new().unwrap();

  wardrobe_cmd(&temp)
    .env("GEMINI_API_KEY", "super-secret")
    .args(["config"])
    .assert()
    .success()
    .stdout(contains("********").and(contains("super-secret").not()).and(contains("gemini-2.5-flash-image")));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_malformed_config_is_an_error() {
  let temp = assert_fs::TempDir::new().unwrap();
  std::fs::write(temp.path().join("config.json"), "{ nope").unwrap();

  wardrobe_cmd(&temp)
    .args(["config"])
    .assert()
    .failure()
    .stderr(contains("Failed to load configuration"));

  temp.close().unwrap();
}

#[test]
#[serial]
fn test_suggest_with_empty_wardrobe_needs_no_network() {
  let temp = assert_fs::TempDir::new().unwrap();

  wardrobe_cmd(&temp)
    .args(["suggest"])
    .assert()
    .success()
    .stdout(contains("Your wardrobe is empty"));

  temp.close().unwrap();
}
