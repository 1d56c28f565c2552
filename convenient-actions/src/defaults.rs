//! Conventional project layout

/// Main source group
pub const SOURCE_PATH: &str = "src";

/// Test source group
pub const TEST_SOURCE_PATH: &str = "test";

/// Directory scanned for library archives
pub const LIBRARY_PATH: &str = "lib";

/// Output directory for produced archives
pub const ARTIFACTS_PATH: &str = "artifacts";

/// Default jar destination
pub const JAR_PATH: &str = "artifacts/build.jar";

/// Default zip destination
pub const ZIP_PATH: &str = "artifacts/build.zip";

/// Default war destination
pub const WAR_PATH: &str = "artifacts/build.war";

/// Manifest location inside an archive, and the default jar manifest on disk
pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Web content root of a war project
pub const WEB_CONTENT_PATH: &str = "WebContent";

/// Default war manifest on disk
pub const WAR_MANIFEST_PATH: &str = "WebContent/META-INF/MANIFEST.MF";

/// Library archives of a war project
pub const WAR_LIBS_PATH: &str = "WebContent/WEB-INF/lib";

/// Deployment descriptor entry inside a war
pub const WEB_XML_ENTRY: &str = "WEB-INF/web.xml";

/// Prefix of compiled units and sources inside a war
pub const WAR_CLASSES_PREFIX: &str = "WEB-INF/classes/";

/// Extension of library archives picked up from library directories
pub const LIBRARY_EXTENSION: &str = "jar";
