//! Export archives for importer tests.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const EXPORT_ROOT: &str = "flomo-export";

pub const SAMPLE_PAGE: &str = r#"<html><head><title>memos</title></head><body>
<select id="tag"><option>All tags</option><option>work</option></select>
<div class="memos">
<div class="memo"><div class="time">2024-03-02 18:00:00</div><div class="content"><p>Evening <mark>note</mark> #work</p></div><div class="files"><img src="file/2024-03-02/a b.png" alt="shot"></div></div>
<div class="memo"><div class="time">2024-03-02 09:15:00</div><div class="content"><p>Morning</p></div><div class="files"></div></div>
<div class="memo"><div class="time">2024-03-01 22:10:05</div><div class="content"><p>Yesterday</p></div><div class="files"></div></div>
</div></body></html>"#;

pub const SAMPLE_ATTACHMENT: (&str, &[u8]) = ("file/2024-03-02/a b.png", b"\x89PNG fake");

pub fn memo_html(time: &str, body: &str) -> String {
    format!(
        r#"<div class="memo"><div class="time">{}</div><div class="content"><p>{}</p></div><div class="files"></div></div>"#,
        time, body
    )
}

pub fn export_page(memos: &[String]) -> String {
    format!(
        r#"<html><body><select id="tag"><option>All tags</option></select><div class="memos">{}</div></body></html>"#,
        memos.concat()
    )
}

/// Write `<dir>/export.zip` holding the page and the given attachments
pub fn write_export_zip(dir: &Path, page: &str, attachments: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join("export.zip");
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();

    zip.add_directory(format!("{}/", EXPORT_ROOT), options).unwrap();
    zip.start_file(format!("{}/index.html", EXPORT_ROOT), options)
        .unwrap();
    zip.write_all(page.as_bytes()).unwrap();

    for (name, data) in attachments {
        zip.start_file(format!("{}/{}", EXPORT_ROOT, name), options)
            .unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
    path
}
