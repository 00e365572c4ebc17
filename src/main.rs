uucore::bin!(sedr);
