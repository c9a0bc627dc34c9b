//! Sample reports used across the integration suite. Each writes its XML
//! body to a temp file and returns the path, mirroring the file a real
//! submission would hand to a worker.

use std::io::Write;
use tempfile::NamedTempFile;

pub fn valid_report_xml(hostname: &str) -> String {
    format!(
        r#"<rtevalreport>
            <system hostname="{hostname}" ipaddr="10.0.0.7" arch="x86_64" numcpus="4"/>
            <run rtevalversion="3.2" duration="600" kernel="6.1.0"/>
            <core id="0" min="1.0" max="120.0" mean="3.4" samples="600000" buckets="1,2,3" samples_raw="0.1,0.2"/>
            <core id="1" min="0.9" max="98.0" mean="2.8" samples="600000" buckets="4,5,6" samples_raw="0.3,0.4"/>
        </rtevalreport>"#
    )
}

pub fn report_with_no_measurements(hostname: &str) -> String {
    format!(
        r#"<rtevalreport>
            <system hostname="{hostname}" ipaddr="10.0.0.8" arch="aarch64" numcpus="1"/>
            <run rtevalversion="3.2" duration="10" kernel="6.1.0"/>
        </rtevalreport>"#
    )
}

pub fn malformed_xml() -> &'static str {
    "<rtevalreport><system hostname=\"broken\"></rtevalreport>"
}

/// Writes `contents` to a fresh temp file and returns a handle whose path
/// stays valid until it is dropped.
pub fn write_report(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp report file");
    file.write_all(contents.as_bytes()).expect("write temp report file");
    file.flush().expect("flush temp report file");
    file
}
