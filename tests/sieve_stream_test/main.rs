use std::io::BufReader;

use dbsake::sieve::{self, Options, OutputFormat, SectionKind};

/// A miniature but structurally faithful mysqldump 5.6 stream.
const DUMP: &str = "\
-- MySQL dump 10.13  Distrib 5.6.26, for Linux (x86_64)
--
-- Host: localhost    Database: sakila
-- ------------------------------------------------------
-- Server version\t5.6.26-log

/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET NAMES utf8 */;
/*!40103 SET TIME_ZONE='+00:00' */;

--
-- Current Database: `sakila`
--

CREATE DATABASE /*!32312 IF NOT EXISTS*/ `sakila` /*!40100 DEFAULT CHARACTER SET utf8 */;

USE `sakila`;

--
-- Table structure for table `actor`
--

DROP TABLE IF EXISTS `actor`;
/*!40101 SET @saved_cs_client     = @@character_set_client */;
/*!40101 SET character_set_client = utf8 */;
CREATE TABLE `actor` (
  `actor_id` smallint(5) unsigned NOT NULL AUTO_INCREMENT,
  `last_name` varchar(45) NOT NULL,
  PRIMARY KEY (`actor_id`),
  KEY `idx_actor_last_name` (`last_name`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8;
/*!40101 SET character_set_client = @saved_cs_client */;

--
-- Dumping data for table `actor`
--

LOCK TABLES `actor` WRITE;
/*!40000 ALTER TABLE `actor` DISABLE KEYS */;
INSERT INTO `actor` VALUES (1,'GUINESS'),(2,'WAHLBERG');
/*!40000 ALTER TABLE `actor` ENABLE KEYS */;
UNLOCK TABLES;

--
-- Table structure for table `city`
--

DROP TABLE IF EXISTS `city`;
CREATE TABLE `city` (
  `city_id` smallint(5) unsigned NOT NULL,
  PRIMARY KEY (`city_id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8;

--
-- Dumping data for table `city`
--

INSERT INTO `city` VALUES (1);

--
-- Final view structure for view `actor_info`
--

/*!50001 DROP VIEW IF EXISTS `actor_info`*/;
/*!50001 CREATE VIEW `actor_info` AS select 1 AS `one` */;

/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;
/*!40101 SET CHARACTER_SET_CLIENT=@OLD_CHARACTER_SET_CLIENT */;

-- Dump completed on 2014-06-18 16:38:15
";

fn run_sieve(options: &Options, input: &str) -> (Vec<u8>, Vec<(SectionKind, u64)>) {
    let mut reader = BufReader::new(input.as_bytes());
    let mut output = Vec::new();
    let stats = sieve::sieve(options, &mut reader, &mut output).expect("sieve run");
    let mut stats: Vec<(SectionKind, u64)> = stats.into_iter().collect();
    stats.sort_by_key(|(kind, _)| kind.as_str());
    (output, stats)
}

/// A dump carrying replication coordinates and a trigger block.
const REPL_DUMP: &str = "\
-- MySQL dump 10.13  Distrib 5.6.26, for Linux (x86_64)
--
-- Host: localhost    Database: shop
-- ------------------------------------------------------
-- Server version\t5.6.26-log

/*!40101 SET NAMES utf8 */;

--
-- Position to start replication or point-in-time recovery from
--

-- CHANGE MASTER TO MASTER_LOG_FILE='mysql-bin.000003', MASTER_LOG_POS=73;

--
-- Table structure for table `orders`
--

DROP TABLE IF EXISTS `orders`;
CREATE TABLE `orders` (
  `order_id` int(11) NOT NULL,
  PRIMARY KEY (`order_id`)
) ENGINE=InnoDB;

--
-- Dumping data for table `orders`
--

INSERT INTO `orders` VALUES (1);

/*!50003 SET @saved_cs_client      = @@character_set_client */ ;
/*!50003 SET character_set_client  = utf8 */ ;
DELIMITER ;;
/*!50003 CREATE*/ /*!50017 DEFINER=`root`@`localhost`*/ /*!50003 TRIGGER ins_order BEFORE INSERT ON orders FOR EACH ROW SET @x = 1 */;;
DELIMITER ;
/*!50003 SET character_set_client  = @saved_cs_client */ ;
--
-- Final view structure for view `order_summary`
--

/*!50001 CREATE VIEW `order_summary` AS select 1 AS `one` */;

/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;

-- Dump completed on 2014-06-18 16:38:15
";

#[test]
fn stream_mode_round_trips_byte_for_byte() {
    let options = Options::default();
    let (output, stats) = run_sieve(&options, DUMP);
    assert_eq!(String::from_utf8(output).unwrap(), DUMP);
    let lookup = |kind: SectionKind| {
        stats
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    assert_eq!(lookup(SectionKind::Header), 1);
    assert_eq!(lookup(SectionKind::CreateDatabase), 1);
    assert_eq!(lookup(SectionKind::TableStructure), 2);
    assert_eq!(lookup(SectionKind::TableData), 2);
    assert_eq!(lookup(SectionKind::View), 1);
    assert_eq!(lookup(SectionKind::Footer), 1);
}

#[test]
fn table_filter_drops_unmatched_tables() {
    let options = Options {
        table: vec!["sakila.actor*".to_string()],
        ..Options::default()
    };
    let (output, _) = run_sieve(&options, DUMP);
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("CREATE TABLE `actor`"));
    assert!(!output.contains("CREATE TABLE `city`"));
    assert!(!output.contains("INSERT INTO `city`"));
    // sections without a table context survive
    assert!(output.contains("-- MySQL dump"));
    assert!(output.contains("CREATE DATABASE"));
}

#[test]
fn exclude_sections_drop_kinds() {
    let options = Options {
        exclude_sections: vec![SectionKind::TableData],
        ..Options::default()
    };
    let (output, stats) = run_sieve(&options, DUMP);
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("CREATE TABLE `actor`"));
    assert!(!output.contains("INSERT INTO"));
    assert!(!stats.iter().any(|(kind, _)| *kind == SectionKind::TableData));
}

#[test]
fn defer_indexes_moves_secondary_keys_after_data() {
    let options = Options {
        defer_indexes: true,
        ..Options::default()
    };
    let (output, _) = run_sieve(&options, DUMP);
    let output = String::from_utf8(output).unwrap();

    // the secondary key is gone from the CREATE and the comma repaired
    assert!(!output.contains("  KEY `idx_actor_last_name` (`last_name`)\n"));
    assert!(output.contains("  PRIMARY KEY (`actor_id`)\n) ENGINE=InnoDB"));

    // exactly one deferred ALTER, after the table's data
    let alter = "ALTER TABLE `actor`\n  ADD KEY `idx_actor_last_name` (`last_name`);\n";
    assert_eq!(output.matches("ALTER TABLE `actor`\n").count(), 1);
    let unlock_at = output.find("UNLOCK TABLES;").unwrap();
    let alter_at = output.find(alter).unwrap();
    assert!(alter_at > unlock_at);
}

#[test]
fn no_write_binlog_injects_guards() {
    let options = Options {
        write_binlog: false,
        ..Options::default()
    };
    let (output, _) = run_sieve(&options, DUMP);
    let output = String::from_utf8(output).unwrap();
    let skip_at = output
        .find("/*!40101 SET @OLD_SQL_LOG_BIN=@@SQL_LOG_BIN, SQL_LOG_BIN=0 */;")
        .expect("skip guard present");
    let enable_at = output
        .find("/*!40101 SET SQL_LOG_BIN=@OLD_SQL_LOG_BIN */;")
        .expect("enable guard present");
    // disable early (in the header), re-enable late (in the footer)
    assert!(skip_at < output.find("CREATE TABLE `actor`").unwrap());
    assert!(enable_at > output.find("UNLOCK TABLES;").unwrap());
}

#[test]
fn replication_dump_round_trips() {
    let options = Options::default();
    let (output, stats) = run_sieve(&options, REPL_DUMP);
    assert_eq!(String::from_utf8(output).unwrap(), REPL_DUMP);
    assert!(stats
        .iter()
        .any(|(kind, n)| *kind == SectionKind::ReplicationInfo && *n == 1));
    assert!(stats
        .iter()
        .any(|(kind, n)| *kind == SectionKind::Triggers && *n == 1));
}

#[test]
fn master_data_uncomments_change_master() {
    let options = Options {
        master_data: Some(true),
        ..Options::default()
    };
    let (output, _) = run_sieve(&options, REPL_DUMP);
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("\nCHANGE MASTER TO MASTER_LOG_FILE='mysql-bin.000003'"));
    assert!(!output.contains("-- CHANGE MASTER"));
}

#[test]
fn no_master_data_comments_change_master() {
    // an uncommented CHANGE MASTER (mysqldump --master-data=1)
    let dump = REPL_DUMP.replace("-- CHANGE MASTER", "CHANGE MASTER");
    let options = Options {
        master_data: Some(false),
        ..Options::default()
    };
    let (output, _) = run_sieve(&options, &dump);
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("-- CHANGE MASTER TO MASTER_LOG_FILE"));
}

#[test]
fn master_data_untouched_without_option() {
    let options = Options::default();
    let (output, _) = run_sieve(&options, REPL_DUMP);
    assert!(String::from_utf8(output)
        .unwrap()
        .contains("-- CHANGE MASTER TO MASTER_LOG_FILE"));
}

#[test]
fn directory_mode_appends_triggers_to_table_file() {
    let tempdir = tempfile::tempdir().unwrap();
    let options = Options {
        output_format: OutputFormat::Directory,
        directory: tempdir.path().to_path_buf(),
        ..Options::default()
    };
    run_sieve(&options, REPL_DUMP);

    let orders = std::fs::read_to_string(tempdir.path().join("shop/orders.sql")).unwrap();
    let create_at = orders.find("CREATE TABLE `orders`").unwrap();
    let insert_at = orders.find("INSERT INTO `orders`").unwrap();
    let trigger_at = orders.find("TRIGGER ins_order").unwrap();
    assert!(create_at < insert_at && insert_at < trigger_at);

    let repl = std::fs::read_to_string(tempdir.path().join("replication_info.sql")).unwrap();
    assert!(repl.contains("CHANGE MASTER"));
}

#[test]
fn directory_mode_routes_per_object_files() {
    let tempdir = tempfile::tempdir().unwrap();
    let options = Options {
        output_format: OutputFormat::Directory,
        directory: tempdir.path().to_path_buf(),
        ..Options::default()
    };
    let (output, _) = run_sieve(&options, DUMP);
    assert!(output.is_empty());

    let base = tempdir.path().join("sakila");
    let createdb = std::fs::read_to_string(base.join("sakila.createdb")).unwrap();
    assert!(createdb.contains("CREATE DATABASE"));

    let actor = std::fs::read_to_string(base.join("actor.sql")).unwrap();
    // schema files replay the dump header before the DDL and data
    assert!(actor.starts_with("-- MySQL dump"));
    assert!(actor.contains("CREATE TABLE `actor`"));
    assert!(actor.contains("INSERT INTO `actor`"));

    let city = std::fs::read_to_string(base.join("city.sql")).unwrap();
    assert!(city.contains("CREATE TABLE `city`"));

    let views = std::fs::read_to_string(base.join("views.ddl")).unwrap();
    assert!(views.starts_with("-- MySQL dump"));
    assert!(views.contains("CREATE VIEW `actor_info`"));
}
